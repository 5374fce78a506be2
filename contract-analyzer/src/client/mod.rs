//! Upload client: select a contract, submit it, render the analysis
//!
//! The client owns an explicit [`ViewState`] and drives it through one
//! select → submit → render cycle at a time. Alerts go through a
//! [`Notifier`]; the HTTP call goes through an [`AnalysisTransport`].

mod transport;

pub use transport::{AnalysisTransport, ClientError, HttpTransport, TransportResponse};

use serde_json::Value;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use tracing::error;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080/analisar";

pub const NO_FILE_LABEL: &str = "Nenhum arquivo selecionado";
pub const SUBMIT_LABEL: &str = "Analisar contrato";
pub const SUBMIT_BUSY_LABEL: &str = "Analisando...";
pub const EMPTY_STATE_TEXT: &str = "Nenhuma análise disponível";

pub const NO_FILE_ALERT: &str = "Por favor, selecione um arquivo";
pub const NETWORK_ERROR_ALERT: &str = "Erro de rede ou servidor";
pub const DEFAULT_REJECTION_ALERT: &str = "Erro ao analisar o contrato";

/// A file chosen for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a file from disk, named by its final path component
    pub async fn from_path(path: &Path) -> Result<Self, ClientError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ClientError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { name, bytes })
    }
}

/// Everything the user can see
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub file_label: String,
    pub submit_enabled: bool,
    pub submit_label: String,
    pub busy_visible: bool,
    pub result_visible: bool,
    pub result_text: String,
    pub empty_state_visible: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            file_label: NO_FILE_LABEL.to_string(),
            submit_enabled: true,
            submit_label: SUBMIT_LABEL.to_string(),
            busy_visible: false,
            result_visible: false,
            result_text: String::new(),
            empty_state_visible: true,
        }
    }
}

/// Puts the view into its in-flight state; restores the submit control when dropped
struct BusyGuard<'a> {
    view: &'a mut ViewState,
}

impl<'a> BusyGuard<'a> {
    fn enter(view: &'a mut ViewState) -> Self {
        view.submit_enabled = false;
        view.submit_label = SUBMIT_BUSY_LABEL.to_string();
        view.busy_visible = true;
        view.result_visible = false;
        view.result_text.clear();
        view.empty_state_visible = false;
        Self { view }
    }
}

impl Deref for BusyGuard<'_> {
    type Target = ViewState;

    fn deref(&self) -> &ViewState {
        self.view
    }
}

impl DerefMut for BusyGuard<'_> {
    fn deref_mut(&mut self) -> &mut ViewState {
        self.view
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.view.submit_enabled = true;
        self.view.submit_label = SUBMIT_LABEL.to_string();
        self.view.busy_visible = false;
    }
}

/// Blocking user-facing alerts
pub trait Notifier {
    fn alert(&mut self, message: &str);
}

/// How a submission ended
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Nothing selected; no request was made
    NoFileSelected,
    /// The analysis was rendered
    Rendered(Value),
    /// The server answered with a non-2xx status
    Rejected { status: u16, message: String },
    /// Network failure or unparseable body
    Failed { message: String },
}

impl SubmitOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, Self::Rendered(_))
    }
}

/// Controller for one upload view
pub struct UploadClient<T, N> {
    transport: T,
    notifier: N,
    selected: Option<SelectedFile>,
    view: ViewState,
}

impl<T: AnalysisTransport, N: Notifier> UploadClient<T, N> {
    pub fn new(transport: T, notifier: N) -> Self {
        Self {
            transport,
            notifier,
            selected: None,
            view: ViewState::default(),
        }
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn selected_file(&self) -> Option<&SelectedFile> {
        self.selected.as_ref()
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Keep the first file of a selection, or clear it when the selection is empty
    pub fn on_file_selected(&mut self, files: impl IntoIterator<Item = SelectedFile>) {
        self.selected = files.into_iter().next();
        self.view.file_label = match &self.selected {
            Some(file) => file.name.clone(),
            None => NO_FILE_LABEL.to_string(),
        };
    }

    /// Upload the selected file and render the answer
    pub async fn submit(&mut self) -> SubmitOutcome {
        let Some(file) = self.selected.as_ref() else {
            self.notifier.alert(NO_FILE_ALERT);
            return SubmitOutcome::NoFileSelected;
        };

        let mut view = BusyGuard::enter(&mut self.view);

        let outcome = match self.transport.send(file).await {
            Ok(response) => interpret(response),
            Err(e) => {
                error!(error = %e, "Upload failed");
                SubmitOutcome::Failed {
                    message: NETWORK_ERROR_ALERT.to_string(),
                }
            }
        };

        match &outcome {
            SubmitOutcome::Rendered(analysis) => {
                view.result_text = render(analysis);
                view.result_visible = true;
            }
            SubmitOutcome::Rejected { message, .. } | SubmitOutcome::Failed { message } => {
                self.notifier.alert(message);
                view.empty_state_visible = true;
            }
            SubmitOutcome::NoFileSelected => {}
        }

        outcome
    }
}

fn interpret(response: TransportResponse) -> SubmitOutcome {
    let body: Value = match serde_json::from_slice(&response.body) {
        Ok(body) => body,
        Err(e) => {
            error!(status = response.status, error = %e, "Response body is not JSON");
            return SubmitOutcome::Failed {
                message: NETWORK_ERROR_ALERT.to_string(),
            };
        }
    };

    if response.is_success() {
        return SubmitOutcome::Rendered(body.get("analise").cloned().unwrap_or(Value::Null));
    }

    let message = body
        .get("mensagem")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_REJECTION_ALERT)
        .to_string();
    SubmitOutcome::Rejected {
        status: response.status,
        message,
    }
}

/// Pretty-print an analysis with two-space indentation
pub fn render(analysis: &Value) -> String {
    serde_json::to_string_pretty(analysis).unwrap_or_else(|_| analysis.to_string())
}

//! PDF report of a contract analysis
//!
//! Lays the analysis out as plain text on A4 pages: a title, a summary of
//! counts, one section per list in the analysis and the legal summary.
//! Tables are rendered as ` | `-separated rows in the standard Helvetica
//! fonts, so no font files are embedded.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub const REPORT_TITLE: &str = "Análise de Contrato";

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 50;
const WRAP_COLUMNS: usize = 95;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Falha ao montar o PDF: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Falha ao gravar o PDF: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
enum Line {
    Title(String),
    Heading(String),
    Body(String),
    Gap,
}

impl Line {
    fn style(&self) -> (&'static str, i64, i64) {
        // font resource, size, leading
        match self {
            Line::Title(_) => ("F2", 18, 28),
            Line::Heading(_) => ("F2", 13, 20),
            Line::Body(_) => ("F1", 10, 14),
            Line::Gap => ("F1", 10, 10),
        }
    }
}

fn items<'a>(analysis: &'a Value, key: &str) -> &'a [Value] {
    analysis
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn cell(item: &Value, key: &str) -> String {
    match item.get(key) {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(s)) if s.is_empty() => "-".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(true)) => "sim".to_string(),
        Some(Value::Bool(false)) => "não".to_string(),
        Some(Value::Array(values)) => values
            .iter()
            .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
            .collect::<Vec<_>>()
            .join(", "),
        Some(other) => other.to_string(),
    }
}

fn table(lines: &mut Vec<Line>, rows: &[Value], columns: &[(&str, &str)], empty: &str) {
    if rows.is_empty() {
        lines.push(Line::Body(empty.to_string()));
        return;
    }

    let header: Vec<&str> = columns.iter().map(|(label, _)| *label).collect();
    lines.push(Line::Body(header.join(" | ")));
    for row in rows {
        let cells: Vec<String> = columns.iter().map(|(_, key)| cell(row, key)).collect();
        lines.push(Line::Body(cells.join(" | ")));
    }
}

fn report_lines(analysis: &Value) -> Vec<Line> {
    let datas = items(analysis, "datas_vencimento");
    let valores = items(analysis, "valores_multas");
    let partes = items(analysis, "partes");
    let comprometedoras = items(analysis, "clausulas_comprometedoras");
    let padrao = items(analysis, "clausulas_padrao");
    let nota = analysis
        .get("analise_risco")
        .map(|risco| cell(risco, "risco_geral_nota"))
        .unwrap_or_else(|| "-".to_string());

    let mut lines = vec![
        Line::Title(REPORT_TITLE.to_string()),
        Line::Heading("Resumo".to_string()),
        Line::Body(format!("Datas de vencimento: {}", datas.len())),
        Line::Body(format!("Valores/Multas: {}", valores.len())),
        Line::Body(format!("Partes: {}", partes.len())),
        Line::Body(format!("Cláusulas de risco: {}", comprometedoras.len())),
        Line::Body(format!("Nota de risco (1-5): {nota}")),
        Line::Gap,
    ];

    let sections: [(&str, &[Value], &[(&str, &str)], &str); 5] = [
        (
            "Datas de vencimento",
            datas,
            &[("Descrição", "descricao"), ("Data (ISO)", "data_iso")],
            "Nenhuma data encontrada.",
        ),
        (
            "Valores e Multas",
            valores,
            &[("Tipo", "tipo"), ("Valor", "valor_monetario"), ("Percentual", "percentual"), ("Moeda", "moeda")],
            "Nenhum valor/multa encontrado.",
        ),
        (
            "Partes envolvidas",
            partes,
            &[("Nome", "nome"), ("Tipo", "tipo"), ("Papel", "papel"), ("Documentos", "documentos")],
            "Partes não identificadas claramente.",
        ),
        (
            "Cláusulas comprometedoras",
            comprometedoras,
            &[("Título", "titulo"), ("Parte afetada", "parte_afetada"), ("Gravidade", "gravidade"), ("Origem", "texto_origem")],
            "Nenhuma cláusula potencialmente comprometedora destacada.",
        ),
        (
            "Cláusulas padrão e desvios",
            padrao,
            &[("Tipo", "tipo"), ("Presente", "presente"), ("Desvio", "desvio"), ("Origem", "texto_origem")],
            "Nenhuma cláusula padrão encontrada ou analisada.",
        ),
    ];

    for (heading, rows, columns, empty) in sections {
        lines.push(Line::Heading(heading.to_string()));
        table(&mut lines, rows, columns, empty);
        lines.push(Line::Gap);
    }

    lines.push(Line::Heading("Resumo jurídico".to_string()));
    let resumo = analysis
        .get("resumo_juridico")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("Resumo não disponível.");
    lines.extend(resumo.lines().map(|l| Line::Body(l.to_string())));

    lines
}

/// Break `text` into lines of at most `columns` characters at word boundaries
fn wrap(text: &str, columns: usize) -> Vec<String> {
    let mut wrapped = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let needed = current.chars().count() + usize::from(!current.is_empty()) + word.chars().count();
        if needed > columns && !current.is_empty() {
            wrapped.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() || wrapped.is_empty() {
        wrapped.push(current);
    }
    wrapped
}

/// WinAnsi bytes for `text`; characters outside Latin-1 become `?`
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match u32::from(c) {
            code @ (0x20..=0x7e | 0xa0..=0xff) => code as u8,
            _ => b'?',
        })
        .collect()
}

fn text_line(font: &str, size: i64, y: i64, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![font.into(), size.into()]),
        Operation::new("Td", vec![MARGIN.into(), y.into()]),
        Operation::new("Tj", vec![Object::String(win_ansi(text), StringFormat::Literal)]),
        Operation::new("ET", vec![]),
    ]
}

/// Lay the lines out into per-page operation lists
fn paginate(lines: &[Line]) -> Vec<Vec<Operation>> {
    let top = PAGE_HEIGHT - MARGIN;
    let mut pages = vec![Vec::new()];
    let mut y = top;

    for line in lines {
        let (font, size, leading) = line.style();
        let text = match line {
            Line::Title(t) | Line::Heading(t) | Line::Body(t) => t.as_str(),
            Line::Gap => {
                y -= leading;
                continue;
            }
        };

        for segment in wrap(text, WRAP_COLUMNS) {
            if y - leading < MARGIN {
                pages.push(Vec::new());
                y = top;
            }
            y -= leading;
            if let Some(page) = pages.last_mut() {
                page.extend(text_line(font, size, y, &segment));
            }
        }
    }
    pages
}

/// Render `analysis` as a PDF document
pub fn analysis_pdf(analysis: &Value) -> Result<Vec<u8>, ReportError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => regular, "F2" => bold },
    });

    let mut kids: Vec<ObjectId> = Vec::new();
    for operations in paginate(&report_lines(analysis)) {
        let content = Content { operations }.encode()?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        kids.push(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids.into_iter().map(Object::from).collect::<Vec<_>>(),
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(win_ansi(REPORT_TITLE)),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    debug!(pages = count, bytes = bytes.len(), "Rendered analysis report");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document_text(bytes: &[u8]) -> (usize, String) {
        let doc = Document::load_mem(bytes).unwrap();
        let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
        let text = doc.extract_text(&pages).unwrap();
        (pages.len(), text)
    }

    fn sample() -> Value {
        json!({
            "datas_vencimento": [{"descricao": "Pagamento do aluguel", "data_iso": "2025-04-10"}],
            "valores_multas": [{"tipo": "multa", "valor_monetario": "R$ 1.200,00", "percentual": null, "moeda": "BRL"}],
            "partes": [{"nome": "ACME Ltda", "tipo": "pessoa jurídica", "papel": "locadora", "documentos": ["CNPJ 00.000.000/0001-00"]}],
            "clausulas_comprometedoras": [],
            "clausulas_padrao": [{"tipo": "foro", "presente": true, "desvio": null, "texto_origem": "Foro de São Paulo"}],
            "analise_risco": {"risco_geral_nota": 3, "top_riscos": []},
            "resumo_juridico": "Contrato de locação comercial."
        })
    }

    #[test]
    fn test_report_has_every_section() {
        let bytes = analysis_pdf(&sample()).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let (pages, text) = document_text(&bytes);
        assert_eq!(pages, 1);
        for title in [
            REPORT_TITLE,
            "Resumo",
            "Datas de vencimento",
            "Valores e Multas",
            "Partes envolvidas",
            "Cláusulas comprometedoras",
            "Cláusulas padrão e desvios",
            "Resumo jurídico",
        ] {
            assert!(text.contains(title), "missing section {title:?} in {text:?}");
        }
    }

    #[test]
    fn test_report_rows() {
        let (_, text) = document_text(&analysis_pdf(&sample()).unwrap());
        assert!(text.contains("Nota de risco (1-5): 3"));
        assert!(text.contains("Pagamento do aluguel | 2025-04-10"));
        assert!(text.contains("multa | R$ 1.200,00 | - | BRL"));
        assert!(text.contains("ACME Ltda | pessoa jurídica | locadora | CNPJ 00.000.000/0001-00"));
        assert!(text.contains("foro | sim | - | Foro de São Paulo"));
        assert!(text.contains("Nenhuma cláusula potencialmente comprometedora destacada."));
        assert!(text.contains("Contrato de locação comercial."));
    }

    #[test]
    fn test_empty_analysis_uses_placeholders() {
        let (_, text) = document_text(&analysis_pdf(&json!({})).unwrap());
        assert!(text.contains("Nenhuma data encontrada."));
        assert!(text.contains("Partes não identificadas claramente."));
        assert!(text.contains("Resumo não disponível."));
        assert!(text.contains("Nota de risco (1-5): -"));
    }

    #[test]
    fn test_long_reports_span_pages() {
        let partes: Vec<Value> = (0..120)
            .map(|i| json!({"nome": format!("Parte {i}"), "tipo": "pessoa física"}))
            .collect();
        let (pages, text) = document_text(&analysis_pdf(&json!({"partes": partes})).unwrap());
        assert!(pages > 1);
        assert!(text.contains("Parte 119 | pessoa física"));
    }

    #[test]
    fn test_wrap_and_encoding() {
        assert_eq!(wrap("um dois três", 7), vec!["um dois", "três"]);
        assert_eq!(wrap("", 10), vec![""]);
        assert_eq!(win_ansi("Ação €"), vec![b'A', 0xe7, 0xe3, b'o', b' ', b'?']);
    }
}

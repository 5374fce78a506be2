//! Post-processing of raw model output into the analysis schema

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Top-level keys every analysis carries, with their default values
pub const SCHEMA_KEYS: &[&str] = &[
    "datas_vencimento",
    "valores_multas",
    "partes",
    "clausulas_comprometedoras",
    "clausulas_padrao",
    "analise_risco",
    "resumo_juridico",
];

fn default_for(key: &str) -> Value {
    match key {
        "analise_risco" => Value::Object(Map::new()),
        "resumo_juridico" => Value::String(String::new()),
        _ => Value::Array(Vec::new()),
    }
}

/// Strip markdown code fences and surrounding whitespace
pub fn clean_output(raw: &str) -> String {
    raw.trim().replace("```json", "").replace("```", "")
}

/// Parse model output as JSON, falling back to the outermost `{...}` slice.
/// Anything unparseable yields an empty object.
pub fn parse_lenient(text: &str) -> Value {
    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        return value;
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if end > start {
            if let Ok(value) = serde_json::from_str::<Value>(&text[start..=end]) {
                return value;
            }
        }
    }

    Value::Object(Map::new())
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// True when the model returned nothing usable
pub fn is_empty_result(data: &Value) -> bool {
    let Some(object) = data.as_object() else {
        return true;
    };

    ![
        "datas_vencimento",
        "valores_multas",
        "partes",
        "clausulas_comprometedoras",
        "clausulas_padrao",
        "resumo_juridico",
    ]
    .iter()
    .any(|key| object.get(*key).is_some_and(is_truthy))
}

/// Guarantee every schema key exists; a non-object result is replaced
pub fn ensure_schema(data: Value) -> Value {
    let mut object = match data {
        Value::Object(object) => object,
        _ => Map::new(),
    };
    for key in SCHEMA_KEYS {
        object
            .entry(key.to_string())
            .or_insert_with(|| default_for(key));
    }
    Value::Object(object)
}

fn brl_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"R\$\s*([\d.]+(?:,\d{2})?)").expect("valid BRL regex"))
}

/// First amount written as `R$ 1.234,56` in `text`
pub fn parse_brl_amount(text: &str) -> Option<f64> {
    let captures = brl_regex().captures(text)?;
    let normalized = captures[1].replace('.', "").replace(',', ".");
    normalized.parse().ok()
}

/// Format as Brazilian currency: `R$ 1.234,56`
pub fn format_brl(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::new();
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("R$ {sign}{grouped},{frac_part}")
}

fn is_missing_amount(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty() || s.eq_ignore_ascii_case("none"),
        _ => false,
    }
}

fn fill_currency(item: &mut Map<String, Value>) {
    if !item.get("moeda").is_some_and(is_truthy) {
        item.insert("moeda".to_string(), Value::String("BRL".to_string()));
    }
}

/// Render `valores_multas[].valor_monetario` as BRL text, recovering it
/// from `texto_origem` when the model left it empty.
pub fn normalize_amounts(mut data: Value) -> Value {
    if let Some(items) = data
        .get_mut("valores_multas")
        .and_then(Value::as_array_mut)
    {
        for item in items.iter_mut().filter_map(Value::as_object_mut) {
            normalize_amount(item);
        }
    }
    data
}

fn normalize_amount(item: &mut Map<String, Value>) {
    if is_missing_amount(item.get("valor_monetario")) {
        let amount = item
            .get("texto_origem")
            .and_then(Value::as_str)
            .filter(|source| source.contains("R$"))
            .and_then(parse_brl_amount);
        if let Some(amount) = amount {
            item.insert("valor_monetario".to_string(), Value::String(format_brl(amount)));
            fill_currency(item);
        }
    } else if let Some(amount) = item.get("valor_monetario").and_then(Value::as_f64) {
        item.insert("valor_monetario".to_string(), Value::String(format_brl(amount)));
        fill_currency(item);
    }
}

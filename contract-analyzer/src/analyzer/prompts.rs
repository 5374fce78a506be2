//! Prompts sent to the language model

pub const EXTRACTION_SYSTEM_PROMPT: &str = "Você é um analista jurídico especializado em contratos em português (Brasil). \
Extraia informações com precisão e responda ESTRITAMENTE em JSON válido, sem markdown. \
Extraia datas de vencimento, valores e multas citando o texto exato de origem. \
Se houver referência a prazos em dias (sem data), registre a descrição e mantenha 'data_iso' como null. \
Quando houver 'dia X de cada mês' e forem citados meses específicos com ano (ex.: abril a agosto de 2025), gere uma entrada por mês com 'data_iso' = YYYY-MM-X. \
Use datas em ISO (YYYY-MM-DD) quando possível. Se não houver, use null. \
Para valores monetários (R$), registre exatamente como aparece e não estime. \
Inclua sempre o texto de origem (campo 'texto_origem') com a frase do contrato que fundamenta cada ponto.";

/// Appended to the system prompt on the second, stricter attempt
pub const STRICT_SYSTEM_SUFFIX: &str =
    " Responda SOMENTE com JSON válido, sem markdown e sem texto fora.";

/// Appended to the user prompt on the second, stricter attempt
pub const STRICT_USER_SUFFIX: &str =
    "\nRetorne apenas o JSON começando com '{' e terminando com '}'.";

/// Clause families the model checks for presence and deviations
pub const STANDARD_CLAUSES: &[&str] = &[
    "Confidencialidade",
    "Prazo e Rescisão",
    "Multa por atraso",
    "Garantias",
    "Força maior",
    "Propriedade intelectual",
    "Não concorrência",
    "Resolução de disputas / Foro",
    "Indenização / Limitação de responsabilidade",
    "Proteção de dados pessoais / LGPD",
];

pub fn extraction_user_prompt(contract_text: &str) -> String {
    format!(
        "Leia o contrato a seguir e produza um objeto JSON COM AS CHAVES EXATAS: \
'datas_vencimento' (lista de objetos: descricao, data_iso, texto_origem), \
'valores_multas' (lista: tipo, valor_monetario, moeda, percentual, condicao, texto_origem), \
'partes' (lista: nome, tipo(pessoa física/jurídica), papel, documentos, texto_origem), \
'clausulas_comprometedoras' (lista: titulo, risco(descricao), parte_afetada, gravidade(baixo/médio/alto), texto_origem), \
'clausulas_padrao' (lista: tipo, presente(true/false), desvio, texto_origem; tipos a verificar: {clauses}), \
'analise_risco' (objeto: risco_geral_nota(1-5), top_riscos(lista de strings)), \
'resumo_juridico' (string: resuma cláusulas com títulos e riscos associados; se não houver risco, apenas resuma). \
REGRAS: Não calcule nem estime valores (por exemplo, não derive o valor da parcela dividindo o total). \
Registre apenas números que aparecem literalmente no contrato. Se não houver número explícito, use null. \
IMPORTANTE: Responda SOMENTE com JSON válido.\n\nContrato:\n{contract_text}",
        clauses = STANDARD_CLAUSES.join(", "),
    )
}

pub const QA_SYSTEM_PROMPT: &str = "Você é um assistente jurídico em português. Responda com base nos trechos \
do contrato fornecidos abaixo. Se a resposta não estiver claramente no contrato, diga explicitamente que não há \
evidência suficiente. Seja preciso, cite trechos quando possível e não invente nada.";

pub fn qa_user_prompt(question: &str, context: &str) -> String {
    format!(
        "Pergunta: {question}\n\nTrechos relevantes selecionados:\n{context}\n\n\
Se necessário, considere o restante do contrato, mas priorize os trechos."
    )
}

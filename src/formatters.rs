// Display formatters for person documents and contacts
//
// Values are stored as bare digits; these only shape them for display.
// Anything that doesn't have the expected digit count is returned unchanged.

use crate::cnpj;

/// Format a CPF: "12345678909" → "123.456.789-09"
pub fn format_cpf(value: &str) -> String {
    let digits = cnpj::strip(value);
    if digits.len() != 11 {
        return value.to_string();
    }

    format!(
        "{}.{}.{}-{}",
        &digits[0..3],
        &digits[3..6],
        &digits[6..9],
        &digits[9..11]
    )
}

/// Format a complete CNPJ; partial values are returned unchanged
pub fn format_cnpj(value: &str) -> String {
    if cnpj::strip(value).len() != cnpj::CNPJ_LENGTH {
        return value.to_string();
    }
    cnpj::format(value)
}

/// Format a document by its type (CPF, CNPJ, anything else verbatim)
pub fn format_document(document_type: &str, value: &str) -> String {
    match document_type.to_ascii_uppercase().as_str() {
        "CPF" => format_cpf(value),
        "CNPJ" => format_cnpj(value),
        _ => value.to_string(),
    }
}

/// Brazilian phone with area code: 10 digits (landline) or 11 (mobile)
fn format_phone_digits(digits: &str) -> Option<String> {
    match digits.len() {
        10 => Some(format!("({}) {}-{}", &digits[0..2], &digits[2..6], &digits[6..10])),
        11 => Some(format!("({}) {}-{}", &digits[0..2], &digits[2..7], &digits[7..11])),
        _ => None,
    }
}

/// Format a contact value by its type
///
/// PHONE    → "(11) 98765-4321"
/// WHATSAPP → "+55 (11) 98765-4321"
/// others   → verbatim (emails, URLs, ...)
pub fn format_contact(contact_type: &str, value: &str) -> String {
    let digits = cnpj::strip(value);

    match contact_type.to_ascii_uppercase().as_str() {
        "PHONE" => format_phone_digits(&digits).unwrap_or_else(|| value.to_string()),
        "WHATSAPP" => format_phone_digits(&digits)
            .map(|phone| format!("+55 {}", phone))
            .unwrap_or_else(|| value.to_string()),
        _ => value.to_string(),
    }
}

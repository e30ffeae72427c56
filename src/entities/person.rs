// 👤 Person Entity - individuals (PF) and companies (PJ)
//
// A person owns zero-or-more documents, contacts and addresses.
// The nested records are always read together with the person.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::cnpj;
use crate::formatters;

// ============================================================================
// PERSON TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersonType {
    /// Pessoa física - an individual (CPF holder)
    #[serde(rename = "PF")]
    Individual,

    /// Pessoa jurídica - a company (CNPJ holder)
    #[serde(rename = "PJ")]
    Company,
}

impl PersonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonType::Individual => "PF",
            PersonType::Company => "PJ",
        }
    }

    pub fn parse(value: &str) -> Option<PersonType> {
        match value {
            "PF" => Some(PersonType::Individual),
            "PJ" => Some(PersonType::Company),
            _ => None,
        }
    }
}

// ============================================================================
// NESTED RECORDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonDocument {
    pub person_document_id: i64,
    pub person_id: i64,
    /// CPF, CNPJ, RG, ...
    pub document_type: String,
    /// Bare digits for CPF/CNPJ
    pub document_value: String,
}

impl PersonDocument {
    pub fn display_value(&self) -> String {
        formatters::format_document(&self.document_type, &self.document_value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonContact {
    pub contact_id: i64,
    pub person_id: i64,
    /// EMAIL, PHONE, WHATSAPP, ...
    pub contact_type: String,
    pub contact_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
}

impl PersonContact {
    pub fn display_value(&self) -> String {
        formatters::format_contact(&self.contact_type, &self.contact_value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonAddress {
    pub address_id: i64,
    pub person_id: i64,
    pub street: String,
    pub number: String,
    #[serde(default)]
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    /// IBGE municipality code
    #[serde(default)]
    pub ibge: Option<i64>,
}

// ============================================================================
// PERSON
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub person_id: i64,
    pub full_name: String,
    #[serde(default)]
    pub fantasy_name: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub person_type: Option<PersonType>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub documents: Vec<PersonDocument>,
    #[serde(default)]
    pub contacts: Vec<PersonContact>,
    #[serde(default)]
    pub addresses: Vec<PersonAddress>,
}

impl Person {
    /// Name to show in lists: fantasy name for companies when present
    pub fn display_name(&self) -> &str {
        match (&self.person_type, &self.fantasy_name) {
            (Some(PersonType::Company), Some(fantasy)) if !fantasy.is_empty() => fantasy,
            _ => &self.full_name,
        }
    }

    /// First document (shown in the person list)
    pub fn main_document(&self) -> Option<&PersonDocument> {
        self.documents.first()
    }

    /// CNPJ digits, if the person has a CNPJ document
    pub fn cnpj(&self) -> Option<&str> {
        self.documents
            .iter()
            .find(|doc| doc.document_type.eq_ignore_ascii_case("CNPJ"))
            .map(|doc| doc.document_value.as_str())
    }

    pub fn is_company(&self) -> bool {
        self.person_type == Some(PersonType::Company)
    }
}

// ============================================================================
// INPUTS (create / update payloads)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInput {
    pub document_type: String,
    pub document_value: String,
}

impl DocumentInput {
    pub fn new(document_type: &str, document_value: &str) -> Self {
        DocumentInput {
            document_type: document_type.to_string(),
            document_value: document_value.to_string(),
        }
    }

    /// CPF/CNPJ values are stored as bare digits
    pub fn normalized(&self) -> DocumentInput {
        let document_type = self.document_type.trim().to_ascii_uppercase();
        let document_value = match document_type.as_str() {
            "CPF" | "CNPJ" => cnpj::strip(&self.document_value),
            _ => self.document_value.trim().to_string(),
        };
        DocumentInput {
            document_type,
            document_value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactInput {
    pub contact_type: String,
    pub contact_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
}

impl ContactInput {
    pub fn new(contact_type: &str, contact_value: &str) -> Self {
        ContactInput {
            contact_type: contact_type.to_string(),
            contact_value: contact_value.to_string(),
            contact_name: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressInput {
    pub street: String,
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ibge: Option<i64>,
}

/// Create/update payload for a person
///
/// On update, nested collections are replaced only when present
/// (`None` leaves them as they are).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonInput {
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fantasy_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_type: Option<PersonType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<DocumentInput>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<ContactInput>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<AddressInput>>,
}

impl PersonInput {
    pub fn new(full_name: &str, person_type: Option<PersonType>) -> Self {
        PersonInput {
            full_name: full_name.to_string(),
            fantasy_name: None,
            birth_date: None,
            person_type,
            documents: None,
            contacts: None,
            addresses: None,
        }
    }

    pub fn with_document(mut self, document: DocumentInput) -> Self {
        self.documents.get_or_insert_with(Vec::new).push(document);
        self
    }

    pub fn with_contact(mut self, contact: ContactInput) -> Self {
        self.contacts.get_or_insert_with(Vec::new).push(contact);
        self
    }

    pub fn with_address(mut self, address: AddressInput) -> Self {
        self.addresses.get_or_insert_with(Vec::new).push(address);
        self
    }
}

/// Body of POST /persons/create-by-cnpj
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateByCnpj {
    pub cnpj: String,
}

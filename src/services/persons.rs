// 👤 Person Service - /persons and its nested documents/contacts

use tracing::debug;

use super::fetch_page;
use crate::cnpj;
use crate::entities::{
    ContactInput, CreateByCnpj, DocumentInput, Page, PageQuery, Person, PersonContact,
    PersonDocument, PersonInput,
};
use crate::error::{ApiError, ApiResult};
use crate::http::ApiClient;

const BASE: &str = "/persons";

#[derive(Clone)]
pub struct PersonService {
    client: ApiClient,
}

impl PersonService {
    pub fn new(client: ApiClient) -> Self {
        PersonService { client }
    }

    pub async fn list(&self, query: &PageQuery) -> ApiResult<Page<Person>> {
        debug!(page = query.page, limit = query.limit, "listing persons");
        fetch_page(&self.client, BASE, query.to_pairs(), query.page, query.limit).await
    }

    pub async fn get(&self, person_id: i64) -> ApiResult<Person> {
        self.client.get(&format!("{}/{}", BASE, person_id), Vec::new()).await
    }

    pub async fn create(&self, input: &PersonInput) -> ApiResult<Person> {
        let input = prepare(input)?;
        self.client.post(BASE, &input).await
    }

    pub async fn update(&self, person_id: i64, input: &PersonInput) -> ApiResult<Person> {
        let input = prepare(input)?;
        self.client
            .put(&format!("{}/{}", BASE, person_id), &input)
            .await
    }

    pub async fn delete(&self, person_id: i64) -> ApiResult<()> {
        self.client.delete(&format!("{}/{}", BASE, person_id)).await
    }

    /// Register a company from its CNPJ alone
    ///
    /// The number is checked locally first; an invalid CNPJ never reaches
    /// the server.
    pub async fn create_by_cnpj(&self, cnpj: &str) -> ApiResult<Person> {
        let digits = cnpj::strip(cnpj);
        if !cnpj::validate(&digits) {
            return Err(ApiError::InvalidInput("Invalid CNPJ.".to_string()));
        }

        let body = CreateByCnpj { cnpj: digits };
        self.client
            .post(&format!("{}/create-by-cnpj", BASE), &body)
            .await
    }

    pub async fn add_document(
        &self,
        person_id: i64,
        document: &DocumentInput,
    ) -> ApiResult<PersonDocument> {
        let document = check_document(document)?;
        self.client
            .post(&format!("{}/{}/documents", BASE, person_id), &document)
            .await
    }

    pub async fn remove_document(&self, person_id: i64, document_id: i64) -> ApiResult<()> {
        self.client
            .delete(&format!("{}/{}/documents/{}", BASE, person_id, document_id))
            .await
    }

    pub async fn add_contact(
        &self,
        person_id: i64,
        contact: &ContactInput,
    ) -> ApiResult<PersonContact> {
        if contact.contact_value.trim().is_empty() {
            return Err(ApiError::InvalidInput("Contact value is required.".to_string()));
        }
        self.client
            .post(&format!("{}/{}/contacts", BASE, person_id), contact)
            .await
    }

    pub async fn remove_contact(&self, person_id: i64, contact_id: i64) -> ApiResult<()> {
        self.client
            .delete(&format!("{}/{}/contacts/{}", BASE, person_id, contact_id))
            .await
    }
}

/// Trim the name and normalize every document before sending
fn prepare(input: &PersonInput) -> ApiResult<PersonInput> {
    if input.full_name.trim().is_empty() {
        return Err(ApiError::InvalidInput("Full name is required.".to_string()));
    }

    let documents = match &input.documents {
        Some(documents) => Some(
            documents
                .iter()
                .map(check_document)
                .collect::<ApiResult<Vec<_>>>()?,
        ),
        None => None,
    };

    Ok(PersonInput {
        full_name: input.full_name.trim().to_string(),
        documents,
        ..input.clone()
    })
}

/// Normalized document; a CNPJ must pass its checksum
fn check_document(document: &DocumentInput) -> ApiResult<DocumentInput> {
    let document = document.normalized();
    if document.document_value.is_empty() {
        return Err(ApiError::InvalidInput("Document value is required.".to_string()));
    }
    if document.document_type == "CNPJ" && !cnpj::validate(&document.document_value) {
        return Err(ApiError::InvalidInput("Invalid CNPJ.".to_string()));
    }
    Ok(document)
}

// Persons with their documents, contacts and addresses

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;

use super::{
    date_text, like_pattern, now_text, parse_optional_date, parse_timestamp, record, StoreError,
    StoreResult,
};
use crate::cnpj;
use crate::entities::{
    AddressInput, ContactInput, DocumentInput, Page, PageMeta, PageQuery, Person, PersonAddress,
    PersonContact, PersonDocument, PersonInput, PersonType,
};

const PERSON_COLUMNS: &str =
    "person_id, full_name, fantasy_name, birth_date, person_type, active, created_at, updated_at";

fn person_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Person> {
    let person_type: Option<String> = row.get(4)?;
    Ok(Person {
        person_id: row.get(0)?,
        full_name: row.get(1)?,
        fantasy_name: row.get(2)?,
        birth_date: parse_optional_date(row, 3)?,
        person_type: person_type.as_deref().and_then(PersonType::parse),
        active: row.get(5)?,
        created_at: parse_timestamp(row, 6)?,
        updated_at: parse_timestamp(row, 7)?,
        documents: Vec::new(),
        contacts: Vec::new(),
        addresses: Vec::new(),
    })
}

// ============================================================================
// NESTED READS
// ============================================================================

fn load_documents(conn: &Connection, person_id: i64) -> StoreResult<Vec<PersonDocument>> {
    let mut stmt = conn.prepare(
        "SELECT person_document_id, person_id, document_type, document_value
         FROM person_documents WHERE person_id = ?1 ORDER BY person_document_id",
    )?;
    let documents = stmt
        .query_map(params![person_id], |row| {
            Ok(PersonDocument {
                person_document_id: row.get(0)?,
                person_id: row.get(1)?,
                document_type: row.get(2)?,
                document_value: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(documents)
}

fn load_contacts(conn: &Connection, person_id: i64) -> StoreResult<Vec<PersonContact>> {
    let mut stmt = conn.prepare(
        "SELECT contact_id, person_id, contact_type, contact_value, contact_name
         FROM person_contacts WHERE person_id = ?1 ORDER BY contact_id",
    )?;
    let contacts = stmt
        .query_map(params![person_id], |row| {
            Ok(PersonContact {
                contact_id: row.get(0)?,
                person_id: row.get(1)?,
                contact_type: row.get(2)?,
                contact_value: row.get(3)?,
                contact_name: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(contacts)
}

fn load_addresses(conn: &Connection, person_id: i64) -> StoreResult<Vec<PersonAddress>> {
    let mut stmt = conn.prepare(
        "SELECT address_id, person_id, street, number, complement, neighborhood, city, state,
                postal_code, country, reference, ibge
         FROM person_addresses WHERE person_id = ?1 ORDER BY address_id",
    )?;
    let addresses = stmt
        .query_map(params![person_id], |row| {
            Ok(PersonAddress {
                address_id: row.get(0)?,
                person_id: row.get(1)?,
                street: row.get(2)?,
                number: row.get(3)?,
                complement: row.get(4)?,
                neighborhood: row.get(5)?,
                city: row.get(6)?,
                state: row.get(7)?,
                postal_code: row.get(8)?,
                country: row.get(9)?,
                reference: row.get(10)?,
                ibge: row.get(11)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(addresses)
}

fn with_nested(conn: &Connection, mut person: Person) -> StoreResult<Person> {
    person.documents = load_documents(conn, person.person_id)?;
    person.contacts = load_contacts(conn, person.person_id)?;
    person.addresses = load_addresses(conn, person.person_id)?;
    Ok(person)
}

// ============================================================================
// READS
// ============================================================================

/// Active persons matching the search (name, fantasy name or document)
pub fn list_persons(conn: &Connection, query: &PageQuery) -> StoreResult<Page<Person>> {
    let name_pattern = query.search.as_deref().map(like_pattern);
    let digits = query
        .search
        .as_deref()
        .map(cnpj::strip)
        .filter(|digits| !digits.is_empty());
    let document_pattern = digits.as_deref().map(like_pattern);

    let filter = "active = 1 AND (
            ?1 IS NULL
            OR full_name LIKE ?1 ESCAPE '\\'
            OR fantasy_name LIKE ?1 ESCAPE '\\'
            OR person_id IN (
                SELECT person_id FROM person_documents
                WHERE document_value LIKE ?2 ESCAPE '\\' OR document_value LIKE ?1 ESCAPE '\\'
            )
        )";

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM persons WHERE {}", filter),
        params![name_pattern, document_pattern],
        |row| row.get(0),
    )?;
    let meta = PageMeta::new(total as u64, query.page, query.limit);

    let sql = format!(
        "SELECT {} FROM persons WHERE {} ORDER BY full_name, person_id LIMIT ?3 OFFSET ?4",
        PERSON_COLUMNS, filter
    );
    let mut stmt = conn.prepare(&sql)?;
    let persons = stmt
        .query_map(
            params![name_pattern, document_pattern, meta.per_page, meta.offset() as i64],
            person_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    let data = persons
        .into_iter()
        .map(|person| with_nested(conn, person))
        .collect::<StoreResult<Vec<_>>>()?;

    Ok(Page::new(data, meta))
}

pub fn get_person(conn: &Connection, person_id: i64) -> StoreResult<Person> {
    let sql = format!("SELECT {} FROM persons WHERE person_id = ?1 AND active = 1", PERSON_COLUMNS);
    let person = conn
        .query_row(&sql, params![person_id], person_from_row)
        .optional()?
        .ok_or(StoreError::not_found("person", person_id))?;
    with_nested(conn, person)
}

/// Active person holding a document, if any
pub fn find_by_document(
    conn: &Connection,
    document_type: &str,
    document_value: &str,
) -> StoreResult<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT p.person_id FROM persons p
             JOIN person_documents d ON d.person_id = p.person_id
             WHERE p.active = 1 AND d.document_type = ?1 AND d.document_value = ?2
             LIMIT 1",
            params![document_type, document_value],
            |row| row.get(0),
        )
        .optional()?)
}

// ============================================================================
// VALIDATION
// ============================================================================

fn checked_document(
    conn: &Connection,
    document: &DocumentInput,
    owner: Option<i64>,
) -> StoreResult<DocumentInput> {
    let document = document.normalized();
    if document.document_type.is_empty() || document.document_value.is_empty() {
        return Err(StoreError::Invalid(
            "document_type and document_value are required".to_string(),
        ));
    }

    if document.document_type == "CNPJ" {
        if !cnpj::validate(&document.document_value) {
            return Err(StoreError::Invalid(format!(
                "invalid CNPJ {}",
                cnpj::format(&document.document_value)
            )));
        }
        if let Some(holder) = find_by_document(conn, "CNPJ", &document.document_value)? {
            if Some(holder) != owner {
                return Err(StoreError::Conflict(format!(
                    "CNPJ {} is already registered",
                    cnpj::format(&document.document_value)
                )));
            }
        }
    }

    Ok(document)
}

fn checked_contact(contact: &ContactInput) -> StoreResult<ContactInput> {
    let contact_type = contact.contact_type.trim().to_ascii_uppercase();
    let contact_value = contact.contact_value.trim().to_string();
    if contact_type.is_empty() || contact_value.is_empty() {
        return Err(StoreError::Invalid(
            "contact_type and contact_value are required".to_string(),
        ));
    }
    Ok(ContactInput {
        contact_type,
        contact_value,
        contact_name: contact.contact_name.clone(),
    })
}

fn checked_name(full_name: &str) -> StoreResult<String> {
    let name = full_name.trim();
    if name.is_empty() {
        return Err(StoreError::Invalid("full_name is required".to_string()));
    }
    Ok(name.to_string())
}

// ============================================================================
// NESTED WRITES
// ============================================================================

fn insert_document(conn: &Connection, person_id: i64, document: &DocumentInput) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO person_documents (person_id, document_type, document_value) VALUES (?1, ?2, ?3)",
        params![person_id, document.document_type, document.document_value],
    )?;
    Ok(conn.last_insert_rowid())
}

fn insert_contact(conn: &Connection, person_id: i64, contact: &ContactInput) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO person_contacts (person_id, contact_type, contact_value, contact_name)
         VALUES (?1, ?2, ?3, ?4)",
        params![person_id, contact.contact_type, contact.contact_value, contact.contact_name],
    )?;
    Ok(conn.last_insert_rowid())
}

fn insert_address(conn: &Connection, person_id: i64, address: &AddressInput) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO person_addresses (person_id, street, number, complement, neighborhood, city,
                                       state, postal_code, country, reference, ibge)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            person_id,
            address.street,
            address.number,
            address.complement,
            address.neighborhood,
            address.city,
            address.state,
            cnpj::strip(&address.postal_code),
            address.country,
            address.reference,
            address.ibge,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn replace_nested(
    conn: &Connection,
    person_id: i64,
    input: &PersonInput,
) -> StoreResult<()> {
    if let Some(documents) = &input.documents {
        conn.execute("DELETE FROM person_documents WHERE person_id = ?1", params![person_id])?;
        for document in documents {
            let document = checked_document(conn, document, Some(person_id))?;
            insert_document(conn, person_id, &document)?;
        }
    }
    if let Some(contacts) = &input.contacts {
        conn.execute("DELETE FROM person_contacts WHERE person_id = ?1", params![person_id])?;
        for contact in contacts {
            insert_contact(conn, person_id, &checked_contact(contact)?)?;
        }
    }
    if let Some(addresses) = &input.addresses {
        conn.execute("DELETE FROM person_addresses WHERE person_id = ?1", params![person_id])?;
        for address in addresses {
            insert_address(conn, person_id, address)?;
        }
    }
    Ok(())
}

// ============================================================================
// WRITES
// ============================================================================

pub fn create_person(conn: &Connection, input: &PersonInput, actor: &str) -> StoreResult<Person> {
    let full_name = checked_name(&input.full_name)?;
    let now = now_text();

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO persons (full_name, fantasy_name, birth_date, person_type, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![
            full_name,
            input.fantasy_name,
            input.birth_date.map(date_text),
            input.person_type.map(|t| t.as_str()),
            now,
        ],
    )?;
    let person_id = tx.last_insert_rowid();
    replace_nested(&tx, person_id, input)?;
    record(&tx, "created", "person", person_id, serde_json::to_value(input)?, actor)?;
    tx.commit()?;

    get_person(conn, person_id)
}

/// Scalars are overwritten; nested collections only when present
pub fn update_person(
    conn: &Connection,
    person_id: i64,
    input: &PersonInput,
    actor: &str,
) -> StoreResult<Person> {
    get_person(conn, person_id)?;
    let full_name = checked_name(&input.full_name)?;

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE persons
         SET full_name = ?1, fantasy_name = ?2, birth_date = ?3, person_type = ?4, updated_at = ?5
         WHERE person_id = ?6",
        params![
            full_name,
            input.fantasy_name,
            input.birth_date.map(date_text),
            input.person_type.map(|t| t.as_str()),
            now_text(),
            person_id,
        ],
    )?;
    replace_nested(&tx, person_id, input)?;
    record(&tx, "updated", "person", person_id, serde_json::to_value(input)?, actor)?;
    tx.commit()?;

    get_person(conn, person_id)
}

pub fn delete_person(conn: &Connection, person_id: i64, actor: &str) -> StoreResult<()> {
    get_person(conn, person_id)?;
    conn.execute(
        "UPDATE persons SET active = 0, updated_at = ?1 WHERE person_id = ?2",
        params![now_text(), person_id],
    )?;
    record(conn, "deleted", "person", person_id, json!({}), actor)?;
    Ok(())
}

/// Register a company from its CNPJ alone
///
/// The company is named after its formatted CNPJ until someone edits it.
pub fn create_by_cnpj(conn: &Connection, raw_cnpj: &str, actor: &str) -> StoreResult<Person> {
    let digits = cnpj::strip(raw_cnpj);
    if !cnpj::validate(&digits) {
        return Err(StoreError::Invalid(format!("invalid CNPJ {}", raw_cnpj.trim())));
    }

    let input = PersonInput::new(&cnpj::format(&digits), Some(PersonType::Company))
        .with_document(DocumentInput::new("CNPJ", &digits));
    create_person(conn, &input, actor)
}

pub fn add_document(
    conn: &Connection,
    person_id: i64,
    document: &DocumentInput,
    actor: &str,
) -> StoreResult<PersonDocument> {
    get_person(conn, person_id)?;
    let document = checked_document(conn, document, Some(person_id))?;
    let document_id = insert_document(conn, person_id, &document)?;
    record(conn, "document_added", "person", person_id, serde_json::to_value(&document)?, actor)?;

    Ok(PersonDocument {
        person_document_id: document_id,
        person_id,
        document_type: document.document_type,
        document_value: document.document_value,
    })
}

pub fn remove_document(
    conn: &Connection,
    person_id: i64,
    document_id: i64,
    actor: &str,
) -> StoreResult<()> {
    let removed = conn.execute(
        "DELETE FROM person_documents WHERE person_document_id = ?1 AND person_id = ?2",
        params![document_id, person_id],
    )?;
    if removed == 0 {
        return Err(StoreError::not_found("document", document_id));
    }
    record(conn, "document_removed", "person", person_id, json!({ "document_id": document_id }), actor)?;
    Ok(())
}

pub fn add_contact(
    conn: &Connection,
    person_id: i64,
    contact: &ContactInput,
    actor: &str,
) -> StoreResult<PersonContact> {
    get_person(conn, person_id)?;
    let contact = checked_contact(contact)?;
    let contact_id = insert_contact(conn, person_id, &contact)?;
    record(conn, "contact_added", "person", person_id, serde_json::to_value(&contact)?, actor)?;

    Ok(PersonContact {
        contact_id,
        person_id,
        contact_type: contact.contact_type,
        contact_value: contact.contact_value,
        contact_name: contact.contact_name,
    })
}

pub fn remove_contact(
    conn: &Connection,
    person_id: i64,
    contact_id: i64,
    actor: &str,
) -> StoreResult<()> {
    let removed = conn.execute(
        "DELETE FROM person_contacts WHERE contact_id = ?1 AND person_id = ?2",
        params![contact_id, person_id],
    )?;
    if removed == 0 {
        return Err(StoreError::not_found("contact", contact_id));
    }
    record(conn, "contact_removed", "person", person_id, json!({ "contact_id": contact_id }), actor)?;
    Ok(())
}

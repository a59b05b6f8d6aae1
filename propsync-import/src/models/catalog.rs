//! Catalog record types (import target)
//!
//! The catalog store holds one reviewed record per legacy listing. Status
//! transitions are driven by manual review in the admin UI; the importer
//! only ever creates records in `Pending` and skips ids it has seen.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::portable_text::PortableTextDocument;

/// Review status of a catalog record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyStatus {
    Pending,
    Reviewing,
    Approved,
    Migrated,
    Rejected,
    Archived,
}

impl PropertyStatus {
    /// Terminal states are never revisited by the importer
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PropertyStatus::Migrated | PropertyStatus::Rejected | PropertyStatus::Archived
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyStatus::Pending => "pending",
            PropertyStatus::Reviewing => "reviewing",
            PropertyStatus::Approved => "approved",
            PropertyStatus::Migrated => "migrated",
            PropertyStatus::Rejected => "rejected",
            PropertyStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PropertyStatus::Pending),
            "reviewing" => Some(PropertyStatus::Reviewing),
            "approved" => Some(PropertyStatus::Approved),
            "migrated" => Some(PropertyStatus::Migrated),
            "rejected" => Some(PropertyStatus::Rejected),
            "archived" => Some(PropertyStatus::Archived),
            _ => None,
        }
    }
}

/// Named-field document produced by the field mapper
///
/// Field names follow the target content model (Brazilian real-estate
/// vocabulary, as in the legacy site).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappedProperty {
    pub titulo: String,
    pub slug: String,
    /// "Venda" or "Aluguel"
    pub finalidade: String,
    /// "Casa", "Apartamento", "Comercial" or "Outro"
    pub tipo_imovel: String,
    pub descricao: PortableTextDocument,
    pub dormitorios: u32,
    pub banheiros: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_util: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preco: Option<f64>,
    pub endereco: String,
    pub bairro: String,
    pub cidade: String,
    pub estado: String,
    pub codigo_interno: String,
}

/// One record of the catalog store, keyed externally by `wp_id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub id: Uuid,
    /// Legacy WPL property id; unique across the catalog
    pub wp_id: i64,
    pub status: PropertyStatus,
    pub data: MappedProperty,
    pub thumbnail_url: Option<String>,
    pub photo_urls: Vec<String>,
    pub photo_count: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PropertyRecord {
    /// Fresh record as created on first import
    pub fn pending(wp_id: i64, data: MappedProperty, photo_count: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            wp_id,
            status: PropertyStatus::Pending,
            data,
            thumbnail_url: None,
            photo_urls: Vec::new(),
            photo_count,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Per-status aggregation for the status endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogStats {
    pub total: u64,
    pub pending: u64,
    pub reviewing: u64,
    pub approved: u64,
    pub migrated: u64,
    pub rejected: u64,
    pub archived: u64,
    pub with_photos: u64,
    pub without_photos: u64,
    /// Approved records that already have photo URLs
    pub ready_to_migrate: u64,
}

//! Typed legacy WPL property record
//!
//! The WPL plugin stores listings in one wide flat table with numeric
//! `field_NNN` column names. All duck-typed access stops here: the export
//! parser produces this struct and the rest of the pipeline never touches
//! raw column positions again.

use serde::{Deserialize, Serialize};

/// One row of the legacy `wp_wpl_properties` export
///
/// Immutable source-of-truth; read-only during migration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegacyPropertyRecord {
    /// Primary key in the legacy table
    pub id: i64,
    /// WPL listing kind discriminator
    pub kind: i64,
    /// Soft-delete flag (1 = deleted); deleted rows are never imported
    pub deleted: i64,
    /// Broker reference code
    pub mls_id: String,
    /// Listing purpose code (9 = sale, 10 = rental)
    pub listing: i64,
    /// Property type code (see the field mapper's code table)
    pub property_type: i64,
    /// Country name
    pub location1_name: String,
    /// State name
    pub location2_name: String,
    /// City name
    pub location3_name: String,
    /// Neighborhood name
    pub location4_name: String,
    pub price: f64,
    pub price_unit: i64,
    pub bedrooms: f64,
    pub bathrooms: f64,
    pub living_area: f64,
    pub living_area_unit: i64,
    pub lot_area: f64,
    pub lot_area_unit: i64,
    /// Listing creation date, as exported (not parsed)
    pub add_date: String,
    /// Number of photos uploaded for this listing
    pub pic_numb: i64,
    /// Street address (WPL custom field 42)
    pub street: String,
    /// Page title (WPL custom field 312)
    pub page_title: String,
    /// Listing title (WPL custom field 313)
    pub listing_title: String,
    /// HTML description (WPL custom field 308)
    pub description_html: String,
}

impl LegacyPropertyRecord {
    /// Whether the row should enter the pipeline at all
    pub fn is_importable(&self) -> bool {
        self.deleted == 0 && self.id > 0
    }
}

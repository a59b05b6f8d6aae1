//! Legacy field mapper
//!
//! Turns a typed legacy record into the named-field document the catalog
//! stores. All WPL code tables live here; nothing downstream ever sees a
//! numeric field code again.
//!
//! Numeric facts (bedrooms, bathrooms, areas) come from the structured WPL
//! columns. The older regex-over-description extraction survives only as a
//! fallback for records whose structured columns are zero.

use once_cell::sync::Lazy;
use regex::Regex;

use propsync_common::{Error, Result};

use crate::models::{LegacyPropertyRecord, MappedProperty};
use crate::services::html_normalizer::normalize_description;

const MAX_TITLE_CHARS: usize = 200;
const MAX_SLUG_CHARS: usize = 96;

const DEFAULT_NEIGHBORHOOD: &str = "Centro";
const DEFAULT_CITY: &str = "Guararema";
const DEFAULT_STATE: &str = "SP";

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static BEDROOMS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)\s*(?:dormit[óo]rios?|quartos?)").unwrap());
static BATHROOMS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+)\s*banheiros?").unwrap());
static AREA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*m\s*[²2]").unwrap());

/// Map a legacy record to the catalog document
///
/// Rejects records the catalog must never hold (non-importable rows,
/// negative prices); everything else maps, however sparse.
pub fn map_property(record: &LegacyPropertyRecord) -> Result<MappedProperty> {
    if !record.is_importable() {
        return Err(Error::InvalidInput(format!(
            "record {} is deleted or has no id",
            record.id
        )));
    }
    if record.price < 0.0 {
        return Err(Error::InvalidInput(format!(
            "record {} has negative price {}",
            record.id, record.price
        )));
    }

    let tipo_imovel = map_property_type(record.property_type);
    let finalidade = map_listing_type(record.listing);

    let titulo = build_title(record, tipo_imovel);
    let slug = build_slug(&titulo, &record.mls_id);

    let description_text = TAG_RE.replace_all(&record.description_html, " ");

    let dormitorios = positive_int(record.bedrooms)
        .or_else(|| extract_int(&BEDROOMS_RE, &description_text))
        .unwrap_or(0);
    let banheiros = positive_int(record.bathrooms)
        .or_else(|| extract_int(&BATHROOMS_RE, &description_text))
        .unwrap_or(0);

    let area_util = positive_f64(record.living_area)
        .or_else(|| extract_f64(&AREA_RE, &description_text));
    let area_total = positive_f64(record.lot_area).or(area_util);

    Ok(MappedProperty {
        titulo,
        slug,
        finalidade: finalidade.to_string(),
        tipo_imovel: tipo_imovel.to_string(),
        descricao: normalize_description(&record.description_html),
        dormitorios,
        banheiros,
        area_util,
        area_total,
        preco: positive_f64(record.price),
        endereco: record.street.trim().to_string(),
        bairro: non_empty_or(&record.location4_name, DEFAULT_NEIGHBORHOOD),
        cidade: non_empty_or(&record.location3_name, DEFAULT_CITY),
        estado: non_empty_or(&record.location2_name, DEFAULT_STATE),
        codigo_interno: if record.mls_id.trim().is_empty() {
            record.id.to_string()
        } else {
            record.mls_id.trim().to_string()
        },
    })
}

/// WPL property-type code table
pub fn map_property_type(code: i64) -> &'static str {
    match code {
        3 | 6 => "Apartamento",
        7 => "Casa",
        10 | 13 | 18 => "Comercial",
        15 | 16 => "Outro",
        _ => "Outro",
    }
}

/// WPL listing-purpose code table (10 is rental, everything else sells)
pub fn map_listing_type(code: i64) -> &'static str {
    if code == 10 {
        "Aluguel"
    } else {
        "Venda"
    }
}

/// Title preference: listing title, then page title, then a synthesized label
fn build_title(record: &LegacyPropertyRecord, tipo_imovel: &str) -> String {
    let titulo = if !record.listing_title.trim().is_empty() {
        record.listing_title.trim().to_string()
    } else if !record.page_title.trim().is_empty() {
        record.page_title.trim().to_string()
    } else {
        let place = if !record.location4_name.trim().is_empty() {
            record.location4_name.trim()
        } else if !record.location3_name.trim().is_empty() {
            record.location3_name.trim()
        } else {
            DEFAULT_CITY
        };
        format!("{} em {}", tipo_imovel, place)
    };

    truncate_chars(&titulo, MAX_TITLE_CHARS)
}

fn build_slug(titulo: &str, mls_id: &str) -> String {
    let base = if mls_id.trim().is_empty() {
        titulo.to_string()
    } else {
        format!("{}-{}", titulo, mls_id.trim())
    };
    truncate_chars(&slugify(&base), MAX_SLUG_CHARS)
}

/// Lowercase, fold diacritics, collapse non-alphanumeric runs to `-`
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for ch in text.chars().flat_map(fold_diacritic) {
        let ch = ch.to_ascii_lowercase();
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Latin diacritics the legacy corpus actually contains
fn fold_diacritic(ch: char) -> std::iter::Once<char> {
    let folded = match ch {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' | 'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => 'u',
        'ç' | 'Ç' => 'c',
        'ñ' | 'Ñ' => 'n',
        other => other,
    };
    std::iter::once(folded)
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn non_empty_or(value: &str, default: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}

fn positive_int(value: f64) -> Option<u32> {
    if value > 0.0 {
        Some(value.floor() as u32)
    } else {
        None
    }
}

fn positive_f64(value: f64) -> Option<f64> {
    if value > 0.0 {
        Some(value)
    } else {
        None
    }
}

fn extract_int(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

fn extract_f64(re: &Regex, text: &str) -> Option<f64> {
    let raw = re.captures(text)?.get(1)?.as_str().replace(',', ".");
    raw.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_record() -> LegacyPropertyRecord {
        LegacyPropertyRecord {
            id: 842,
            deleted: 0,
            mls_id: "REF842".to_string(),
            listing: 9,
            property_type: 7,
            location2_name: "São Paulo".to_string(),
            location3_name: "Guararema".to_string(),
            location4_name: "Itapema".to_string(),
            price: 450_000.0,
            bedrooms: 3.0,
            bathrooms: 2.0,
            living_area: 120.0,
            lot_area: 250.0,
            street: "Rua das Flores, 100".to_string(),
            listing_title: "Casa com quintal em Itapema".to_string(),
            description_html: "<p>Casa ampla com quintal.</p>".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn maps_structured_fields() {
        let mapped = map_property(&base_record()).unwrap();
        assert_eq!(mapped.titulo, "Casa com quintal em Itapema");
        assert_eq!(mapped.tipo_imovel, "Casa");
        assert_eq!(mapped.finalidade, "Venda");
        assert_eq!(mapped.dormitorios, 3);
        assert_eq!(mapped.banheiros, 2);
        assert_eq!(mapped.area_util, Some(120.0));
        assert_eq!(mapped.area_total, Some(250.0));
        assert_eq!(mapped.preco, Some(450_000.0));
        assert_eq!(mapped.bairro, "Itapema");
        assert_eq!(mapped.cidade, "Guararema");
        assert_eq!(mapped.estado, "São Paulo");
        assert_eq!(mapped.codigo_interno, "REF842");
    }

    #[test]
    fn property_type_code_table() {
        assert_eq!(map_property_type(3), "Apartamento");
        assert_eq!(map_property_type(6), "Apartamento");
        assert_eq!(map_property_type(7), "Casa");
        assert_eq!(map_property_type(10), "Comercial");
        assert_eq!(map_property_type(13), "Comercial");
        assert_eq!(map_property_type(18), "Comercial");
        assert_eq!(map_property_type(15), "Outro");
        assert_eq!(map_property_type(99), "Outro");
    }

    #[test]
    fn listing_code_table() {
        assert_eq!(map_listing_type(10), "Aluguel");
        assert_eq!(map_listing_type(9), "Venda");
        assert_eq!(map_listing_type(0), "Venda");
    }

    #[test]
    fn title_falls_back_to_page_title_then_synthesized() {
        let mut record = base_record();
        record.listing_title = String::new();
        record.page_title = "Página da casa".to_string();
        assert_eq!(map_property(&record).unwrap().titulo, "Página da casa");

        record.page_title = String::new();
        assert_eq!(map_property(&record).unwrap().titulo, "Casa em Itapema");

        record.location4_name = String::new();
        assert_eq!(map_property(&record).unwrap().titulo, "Casa em Guararema");
    }

    #[test]
    fn slug_is_folded_and_joined_with_mls_id() {
        let mapped = map_property(&base_record()).unwrap();
        assert_eq!(mapped.slug, "casa-com-quintal-em-itapema-ref842");
    }

    #[test]
    fn slugify_folds_diacritics_and_collapses_runs() {
        assert_eq!(slugify("Sobrado à venda — São João!"), "sobrado-a-venda-sao-joao");
        assert_eq!(slugify("  --  "), "");
    }

    #[test]
    fn slug_is_capped_at_96_chars() {
        let mut record = base_record();
        record.listing_title = "x".repeat(300);
        let mapped = map_property(&record).unwrap();
        assert!(mapped.slug.chars().count() <= 96);
        assert_eq!(mapped.titulo.chars().count(), 200);
    }

    #[test]
    fn regex_fallback_used_when_structured_fields_are_zero() {
        let mut record = base_record();
        record.bedrooms = 0.0;
        record.bathrooms = 0.0;
        record.living_area = 0.0;
        record.lot_area = 0.0;
        record.description_html =
            "<p>Casa com 4 dormitórios, 2 banheiros e 180,5 m² de área.</p>".to_string();

        let mapped = map_property(&record).unwrap();
        assert_eq!(mapped.dormitorios, 4);
        assert_eq!(mapped.banheiros, 2);
        assert_eq!(mapped.area_util, Some(180.5));
        assert_eq!(mapped.area_total, Some(180.5));
    }

    #[test]
    fn structured_fields_win_over_description_text() {
        let mut record = base_record();
        record.description_html = "<p>Anúncio antigo falava em 9 quartos.</p>".to_string();
        let mapped = map_property(&record).unwrap();
        assert_eq!(mapped.dormitorios, 3);
    }

    #[test]
    fn negative_price_is_rejected() {
        let mut record = base_record();
        record.price = -1.0;
        let err = map_property(&record).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn deleted_record_is_rejected() {
        let mut record = base_record();
        record.deleted = 1;
        assert!(map_property(&record).is_err());
    }

    #[test]
    fn empty_mls_id_uses_record_id_as_code() {
        let mut record = base_record();
        record.mls_id = String::new();
        let mapped = map_property(&record).unwrap();
        assert_eq!(mapped.codigo_interno, "842");
        assert_eq!(mapped.slug, "casa-com-quintal-em-itapema");
    }
}

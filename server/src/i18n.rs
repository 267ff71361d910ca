use std::collections::HashMap;

pub const UNNAMED_LAYER_KEY: &str = "toc.layer.unnamed";
pub const COUNT_FAILED_KEY: &str = "toc.error.resource.countfailed";

/// Synchronous translation lookup.
pub trait Translator: Send + Sync {
    /// Returns the translation for `key`, or the key itself when it is unknown.
    fn instant(&self, key: &str) -> String;

    /// Like [`Translator::instant`], substituting `{count}` in the result.
    fn instant_count(&self, key: &str, count: u64) -> String {
        self.instant(key).replace("{count}", &count.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct Catalog {
    language: &'static str,
    entries: HashMap<&'static str, &'static str>,
}

const ENGLISH: &[(&str, &str)] = &[
    (UNNAMED_LAYER_KEY, "Unnamed layer #{count}"),
    (COUNT_FAILED_KEY, "Count failed"),
    ("geometry.type.esriGeometryPoint", "point|points"),
    ("geometry.type.esriGeometryMultipoint", "multipoint|multipoints"),
    ("geometry.type.esriGeometryPolyline", "line|lines"),
    ("geometry.type.esriGeometryPolygon", "polygon|polygons"),
    ("geometry.type.generic", "feature|features"),
];

const FRENCH: &[(&str, &str)] = &[
    (UNNAMED_LAYER_KEY, "Couche sans nom #{count}"),
    (COUNT_FAILED_KEY, "Échec du dénombrement"),
    ("geometry.type.esriGeometryPoint", "point|points"),
    ("geometry.type.esriGeometryMultipoint", "multipoint|multipoints"),
    ("geometry.type.esriGeometryPolyline", "ligne|lignes"),
    ("geometry.type.esriGeometryPolygon", "polygone|polygones"),
    ("geometry.type.generic", "entité|entités"),
];

impl Catalog {
    pub fn english() -> Self {
        Self::from_table("en", ENGLISH)
    }

    pub fn french() -> Self {
        Self::from_table("fr", FRENCH)
    }

    /// Picks a catalog from a language tag such as `fr-CA`; unknown tags get English.
    pub fn for_language(tag: &str) -> Self {
        let primary = tag.split(['-', '_']).next().unwrap_or_default();
        if primary.eq_ignore_ascii_case("fr") {
            Self::french()
        } else {
            Self::english()
        }
    }

    pub fn language(&self) -> &'static str {
        self.language
    }

    fn from_table(language: &'static str, table: &[(&'static str, &'static str)]) -> Self {
        Self {
            language,
            entries: table.iter().copied().collect(),
        }
    }
}

impl Translator for Catalog {
    fn instant(&self, key: &str) -> String {
        self.entries
            .get(key)
            .map(|value| (*value).to_string())
            .unwrap_or_else(|| key.to_string())
    }
}

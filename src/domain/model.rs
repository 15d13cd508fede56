use serde::{Deserialize, Serialize};

/// Key column every report is joined on.
pub const DOCUMENT_COLUMN: &str = "Documento";

/// One finding for one document. `values` runs parallel to the owning
/// report's `columns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRow {
    pub document: String,
    pub values: Vec<String>,
}

/// Result table produced by one screening service. Documents with several
/// findings appear in several rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceReport {
    pub service: String,
    pub columns: Vec<String>,
    pub rows: Vec<ServiceRow>,
}

impl ServiceReport {
    pub fn new(service: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            service: service.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, document: impl Into<String>, values: Vec<String>) {
        self.rows.push(ServiceRow {
            document: document.into(),
            values,
        });
    }

    /// Adds a row carrying the same marker in every column, e.g. "Error"
    /// or "Sin coincidencias".
    pub fn push_uniform(&mut self, document: impl Into<String>, marker: &str) {
        let values = vec![marker.to_string(); self.columns.len()];
        self.push(document, values);
    }
}

/// The combined report: the input document column joined with every
/// service report, one prefixed column per service column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl MergedTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

//! Query-string parsing.
//!
//! [`QueryParams`] is the ordered, possibly repeated key/value snapshot of a request's query
//! string. [`InvoiceParams`] is the typed view of that snapshot used by the renderer: named
//! optional fields, the two "label: value" blocks and the [`Table`] of line items.

use url::form_urlencoded;

use crate::error::Error;

/// Present when the page is being rendered by the PDF endpoint itself
pub const PRINTING_MARKER: &str = "isPrinting";
/// Asks the page to open the native share sheet once the PDF is ready
pub const SHARE_MARKER: &str = "compartir";
/// Repeated parameter declaring the table's columns, in order
pub const COLUMN_KEY: &str = "columna";

/// Ordered snapshot of a URL query string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Parse an `application/x-www-form-urlencoded` query string. A leading `?` is ignored.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self {
            pairs: form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        }
    }

    /// First value for `key`, if any
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `key`, in query order
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Copy of these parameters with every occurrence of `key` removed
    pub fn without(&self, key: &str) -> Self {
        Self {
            pairs: self
                .pairs
                .iter()
                .filter(|(k, _)| k != key)
                .cloned()
                .collect(),
        }
    }

    /// Append a pair, keeping existing occurrences of `key`
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.pairs.push((key.to_string(), value.to_string()));
        self
    }

    /// The parameters the PDF endpoint navigates to: the share marker is dropped and the
    /// printing marker is set exactly once.
    pub fn for_printing(&self) -> Self {
        self.without(SHARE_MARKER)
            .without(PRINTING_MARKER)
            .with(PRINTING_MARKER, "true")
    }

    /// Re-encode as a query string without the leading `?`
    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish()
    }
}

/// One "label: value" line from `SumDataLine` or `TotalDataLine`
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DataLine {
    /// Label including the trailing colon, e.g. `"Envío:"`
    pub label: String,
    pub value: String,
}

/// Parse a multi-line "label: value" block. Lines without a colon, or with a blank label, are
/// dropped.
pub fn parse_data_lines(text: &str) -> Vec<DataLine> {
    text.split('\n')
        .filter_map(|line| {
            let (label, value) = line.split_once(':')?;
            let label = label.trim();
            if label.is_empty() {
                return None;
            }
            Some(DataLine {
                label: format!("{label}:"),
                value: value.trim().to_string(),
            })
        })
        .collect()
}

/// A declared table column and its comma separated cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    cells: Vec<String>,
}

impl Column {
    fn parse(name: &str, raw: Option<&str>) -> Self {
        let cells = raw
            .map(|raw| raw.split(',').map(|c| c.trim().to_string()).collect())
            .unwrap_or_default();
        Self {
            name: name.to_string(),
            cells,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    /// Cell at `row`, empty when the column is shorter than the table
    pub fn cell(&self, row: usize) -> &str {
        self.cells.get(row).map(String::as_str).unwrap_or("")
    }
}

/// The line-item table: ordered columns, row count taken from the first column
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<Column>,
}

/// One table row, cells aligned with [`Table::columns`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row<'a> {
    columns: &'a [Column],
    index: usize,
}

impl<'a> Row<'a> {
    /// Cell for the first column called `column`
    pub fn get(&self, column: &str) -> Option<&'a str> {
        self.columns
            .iter()
            .find(|c| c.name == column)
            .map(|c| c.cell(self.index))
    }

    pub fn cells(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.columns.iter().map(|c| c.cell(self.index))
    }
}

impl Table {
    pub fn from_params(params: &QueryParams) -> Self {
        Self {
            columns: params
                .get_all(COLUMN_KEY)
                .map(|name| Column::parse(name, params.get(name)))
                .collect(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Number of rows, determined solely by the first declared column. A first column that is
    /// missing or starts with a blank cell means no rows.
    pub fn row_count(&self) -> usize {
        match self.columns.first() {
            Some(first) if first.cells.first().is_some_and(|c| !c.is_empty()) => first.cells.len(),
            _ => 0,
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        (0..self.row_count()).map(|index| Row {
            columns: &self.columns,
            index,
        })
    }

    /// Names of columns whose cell count differs from [`Table::row_count`]
    pub fn ragged_columns(&self) -> Vec<&str> {
        let rows = self.row_count();
        if rows == 0 {
            return Vec::new();
        }
        self.columns
            .iter()
            .filter(|c| c.cells.len() != rows)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Reject tables whose columns have different lengths
    pub fn check_rectangular(&self) -> Result<(), Error> {
        let ragged = self.ragged_columns();
        if ragged.is_empty() {
            Ok(())
        } else {
            Err(Error::invalid_input(format!(
                "columns {} do not have {} values",
                ragged.join(", "),
                self.row_count()
            )))
        }
    }
}

/// Typed configuration of one invoice page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceParams {
    pub theme: Option<String>,
    /// `None` when `Logo1` is absent, `Some("")` when it was given blank
    pub logo1: Option<String>,
    pub logo2: Option<String>,
    pub invoice: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub payment_method: Option<String>,
    pub sender: Option<String>,
    pub receiver: Option<String>,
    pub summary_lines: Vec<DataLine>,
    pub total_lines: Vec<DataLine>,
    pub table: Table,
    pub subtotal: Option<String>,
    pub discount: Option<String>,
    pub tax_label: Option<String>,
    pub tax_amount: Option<String>,
    pub total: Option<String>,
    pub note: Option<String>,
    pub print_note: Option<String>,
    pub filename: Option<String>,
    pub scroll_to: Option<String>,
    pub printing: bool,
    pub share: bool,
}

fn non_blank(params: &QueryParams, key: &str) -> Option<String> {
    params
        .get(key)
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

impl From<&QueryParams> for InvoiceParams {
    fn from(params: &QueryParams) -> Self {
        Self {
            theme: non_blank(params, "tema"),
            logo1: params.get("Logo1").map(str::to_string),
            logo2: params.get("Logo2").map(str::to_string),
            invoice: non_blank(params, "Factura"),
            date: non_blank(params, "Fecha"),
            time: non_blank(params, "Hora"),
            payment_method: non_blank(params, "FormaPago"),
            sender: non_blank(params, "De"),
            receiver: non_blank(params, "Cliente"),
            summary_lines: params
                .get("SumDataLine")
                .map(parse_data_lines)
                .unwrap_or_default(),
            total_lines: params
                .get("TotalDataLine")
                .map(parse_data_lines)
                .unwrap_or_default(),
            table: Table::from_params(params),
            subtotal: non_blank(params, "Subtotal"),
            discount: non_blank(params, "Descuento"),
            tax_label: non_blank(params, "IVALine"),
            tax_amount: non_blank(params, "IVAMonto"),
            total: non_blank(params, "Total"),
            note: non_blank(params, "Nota"),
            print_note: non_blank(params, "NotaP"),
            filename: params.get("filename").map(str::to_string),
            scroll_to: non_blank(params, "scrollTo"),
            printing: params.contains(PRINTING_MARKER),
            share: params.contains(SHARE_MARKER),
        }
    }
}

impl InvoiceParams {
    pub fn parse(query: &str) -> Self {
        Self::from(&QueryParams::parse(query))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn data_lines_split_on_first_colon() {
        assert_eq!(
            parse_data_lines("A: 1\nB: 2"),
            vec![
                DataLine {
                    label: "A:".into(),
                    value: "1".into()
                },
                DataLine {
                    label: "B:".into(),
                    value: "2".into()
                },
            ]
        );
        let lines = parse_data_lines("Entrega: 10:30\nsin separador\n: huérfano");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].value, "10:30");
    }

    #[test]
    fn table_rows_follow_first_column() {
        let params = QueryParams::parse("columna=Qty&columna=Price&Qty=1,2,3&Price=10,20,30");
        let table = Table::from_params(&params);
        assert_eq!(table.row_count(), 3);
        let first = table.rows().next().unwrap();
        assert_eq!(first.get("Qty"), Some("1"));
        assert_eq!(first.get("Price"), Some("10"));
        assert!(table.ragged_columns().is_empty());
        assert!(table.check_rectangular().is_ok());
    }

    #[test]
    fn ragged_columns_are_padded_and_reported() {
        let params = QueryParams::parse("columna=Qty&columna=Price&Qty=1,%202,3&Price=10");
        let table = Table::from_params(&params);
        let rows: Vec<Vec<&str>> = table.rows().map(|r| r.cells().collect()).collect();
        assert_eq!(rows, vec![vec!["1", "10"], vec!["2", ""], vec!["3", ""]]);
        assert_eq!(table.ragged_columns(), vec!["Price"]);
        assert!(table.check_rectangular().unwrap_err().is_invalid_input());
    }

    #[test]
    fn blank_first_column_means_no_rows() {
        let table = Table::from_params(&QueryParams::parse("columna=Qty&columna=Price&Price=1"));
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.columns().len(), 2);
        assert!(Table::from_params(&QueryParams::default()).is_empty());
    }

    #[test]
    fn blank_first_cell_means_no_rows() {
        let table =
            Table::from_params(&QueryParams::parse("columna=Qty&columna=Price&Qty=%20,5&Price=1,2"));
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.rows().count(), 0);
        assert!(table.ragged_columns().is_empty());
        // Only the first column decides; blank cells elsewhere are kept
        let table = Table::from_params(&QueryParams::parse("columna=Qty&columna=Price&Qty=1,2&Price=,7"));
        let rows: Vec<Vec<&str>> = table.rows().map(|r| r.cells().collect()).collect();
        assert_eq!(rows, vec![vec!["1", ""], vec!["2", "7"]]);
    }

    #[test]
    fn blank_scalars_are_omitted() {
        let params = InvoiceParams::parse("?Fecha=01/02/2025&Hora=%20&Total=&Logo1=");
        assert_eq!(params.date.as_deref(), Some("01/02/2025"));
        assert_eq!(params.time, None);
        assert_eq!(params.total, None);
        assert_eq!(params.logo1.as_deref(), Some(""));
        assert_eq!(params.logo2, None);
        assert!(!params.printing);
    }

    #[test]
    fn printing_query_replaces_markers() {
        let params = QueryParams::parse("Total=5&compartir=1&isPrinting=false&Nota=a+b");
        assert_eq!(
            params.for_printing().to_query_string(),
            "Total=5&Nota=a+b&isPrinting=true"
        );
        assert!(InvoiceParams::from(&params.for_printing()).printing);
    }
}

//! Invoice page view model.
//!
//! This module maps the typed [`InvoiceParams`] into the [`InvoiceView`] handed to the page
//! template: theme classes, logos, styled "label: value" blocks, the line-item table with its
//! column alignments, the summary lines and the print-only footer. The mapping is a pure function
//! of its inputs; the print timestamp is injected through [`ViewOptions`] so that two renders of
//! the same parameters produce the same markup.

use chrono::{DateTime, FixedOffset, Local};
use derive_builder::Builder;
use serde::{Serialize, Serializer};

use crate::params::{InvoiceParams, Table};

/// Logo shown when `Logo1` is not part of the query at all
pub const DEFAULT_LOGO_URL: &str = "https://raw.githubusercontent.com/Francisco05c/Plantilla_HTML_Factura_Documento/a35577462b664ba92d33755a7279a335a06b4243/Logo.svg";

const PRINT_DATE_FORMAT: &str = "%d/%m/%Y %H:%M";

fn serialize_print_date<S>(value: &DateTime<FixedOffset>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.format(PRINT_DATE_FORMAT).to_string())
}

/// Inputs to the view that do not come from the query string
#[derive(Debug, Clone, Builder)]
#[builder(setter(into), pattern = "owned")]
pub struct ViewOptions {
    /// Logo used when `Logo1` is absent. `None` disables the fallback.
    #[builder(default = "Some(DEFAULT_LOGO_URL.to_string())")]
    default_logo: Option<String>,
    /// Timestamp printed in the footer when `NotaP` is given
    #[builder(default = "Local::now().fixed_offset()")]
    printed_at: DateTime<FixedOffset>,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            default_logo: Some(DEFAULT_LOGO_URL.to_string()),
            printed_at: Local::now().fixed_offset(),
        }
    }
}

/// Page theme selected with `tema`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Theme {
    pub name: String,
    pub body_classes: Vec<&'static str>,
    /// On-screen header and footer decorations of the "HF" theme
    pub decorations: bool,
}

impl Theme {
    pub fn from_name(name: Option<&str>) -> Self {
        let (body_classes, decorations) = match name {
            Some("PurpuraGrad") => (vec!["theme-purpura"], false),
            Some("AzulAbstractPro") => (vec!["theme-azul"], false),
            Some("AzulAbstractProHF") => (vec!["theme-azul", "use-hf-azul"], true),
            _ => (vec!["bg-gray-100"], false),
        };
        Self {
            name: name.unwrap_or("default").to_string(),
            body_classes,
            decorations,
        }
    }
}

/// One line of a styled block. `label` holds the text up to and including the first colon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyledLine {
    pub label: Option<String>,
    pub text: String,
}

/// Split a multi-line block into lines, separating a leading "label:" from the rest of each line
pub fn style_block(text: &str) -> Vec<StyledLine> {
    text.split('\n')
        .map(|line| match line.find(':') {
            Some(colon) => StyledLine {
                label: Some(line[..=colon].trim().to_string()),
                text: line[colon + 1..].to_string(),
            },
            None => StyledLine {
                label: None,
                text: line.to_string(),
            },
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Alignment {
    #[serde(rename = "text-left")]
    Left,
    #[serde(rename = "text-right")]
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderCell {
    pub name: String,
    pub align: Alignment,
}

/// A table cell; `|` in the source value splits it into separate lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cell {
    pub lines: Vec<String>,
    pub align: Alignment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableView {
    pub headers: Vec<HeaderCell>,
    pub rows: Vec<Vec<Cell>>,
    /// Message shown in a single full-width row when there are no rows
    pub placeholder: Option<&'static str>,
    pub colspan: usize,
}

fn column_alignment(table: &Table, index: usize) -> Alignment {
    let columns = table.columns();
    let column = &columns[index];
    let name = column.name().to_lowercase();
    if index == 0 || name == "producto" || name == "articulos" {
        Alignment::Left
    } else if index == columns.len() - 1 {
        Alignment::Right
    } else if (0..table.row_count()).any(|row| column.cell(row).contains('|')) {
        Alignment::Left
    } else {
        Alignment::Right
    }
}

impl TableView {
    pub fn new(table: &Table) -> Self {
        let alignments: Vec<Alignment> = (0..table.columns().len())
            .map(|i| column_alignment(table, i))
            .collect();
        let headers = table
            .columns()
            .iter()
            .zip(&alignments)
            .map(|(c, align)| HeaderCell {
                name: c.name().to_string(),
                align: *align,
            })
            .collect();
        let rows: Vec<Vec<Cell>> = table
            .rows()
            .map(|row| {
                row.cells()
                    .zip(&alignments)
                    .map(|(value, align)| Cell {
                        lines: value.split('|').map(str::to_string).collect(),
                        align: *align,
                    })
                    .collect()
            })
            .collect();
        let placeholder = match (rows.is_empty(), table.columns().is_empty()) {
            (false, _) => None,
            (true, false) => Some("No hay elementos para mostrar."),
            (true, true) => Some("No se ha definido la estructura de la tabla."),
        };
        Self {
            headers,
            rows,
            placeholder,
            colspan: table.columns().len().max(1),
        }
    }
}

/// A line of the summary box
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryLine {
    /// Element id for the fixed lines (`subtotal`, `descuento`, ...)
    pub id: Option<&'static str>,
    pub label: String,
    pub value: String,
    /// Rendered with the emphasized total style
    pub total: bool,
}

impl SummaryLine {
    fn fixed(id: &'static str, label: String, value: &str, total: bool) -> Self {
        Self {
            id: Some(id),
            label,
            value: value.to_string(),
            total,
        }
    }
}

fn summary_lines(params: &InvoiceParams) -> Vec<SummaryLine> {
    let mut lines: Vec<SummaryLine> = params
        .summary_lines
        .iter()
        .map(|l| SummaryLine {
            id: None,
            label: l.label.clone(),
            value: l.value.clone(),
            total: false,
        })
        .collect();
    if let Some(subtotal) = &params.subtotal {
        lines.push(SummaryLine::fixed(
            "subtotal",
            "Subtotal:".into(),
            subtotal,
            false,
        ));
    }
    if let Some(discount) = &params.discount {
        lines.push(SummaryLine::fixed(
            "descuento",
            "Descuento:".into(),
            discount,
            false,
        ));
    }
    if params.tax_label.is_some() || params.tax_amount.is_some() {
        lines.push(SummaryLine::fixed(
            "iva",
            format!("IVA ({}):", params.tax_label.as_deref().unwrap_or("")),
            params.tax_amount.as_deref().unwrap_or(""),
            false,
        ));
    }
    lines.extend(params.total_lines.iter().map(|l| SummaryLine {
        id: None,
        label: l.label.clone(),
        value: l.value.clone(),
        total: true,
    }));
    if params.total_lines.is_empty()
        && let Some(total) = &params.total
    {
        lines.push(SummaryLine::fixed("total", "Total:".into(), total, true));
    }
    lines
}

/// Footer that only appears on the printed document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrintFooter {
    /// First line of the invoice block and of the receiver block, joined with " - "
    pub info: String,
    #[serde(serialize_with = "serialize_print_date")]
    pub printed_at: DateTime<FixedOffset>,
    pub note: String,
}

fn first_line(text: Option<&str>) -> Option<&str> {
    text.and_then(|t| t.split('\n').next())
        .map(str::trim)
        .filter(|l| !l.is_empty())
}

/// Everything the page template needs to render one invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceView {
    pub theme: Theme,
    pub logo1: Option<String>,
    pub logo2: Option<String>,
    pub invoice: Option<Vec<StyledLine>>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub payment_method: Option<String>,
    pub sender: Option<Vec<StyledLine>>,
    pub receiver: Option<Vec<StyledLine>>,
    pub table: TableView,
    pub summary: Vec<SummaryLine>,
    pub note: Option<Vec<String>>,
    pub print_footer: Option<PrintFooter>,
}

impl InvoiceView {
    pub fn new(params: &InvoiceParams, options: &ViewOptions) -> Self {
        let logo1 = match &params.logo1 {
            None => options.default_logo.clone(),
            Some(url) if url.trim().is_empty() => None,
            Some(url) => Some(url.clone()),
        };
        let logo2 = params.logo2.clone().filter(|url| !url.trim().is_empty());
        let print_footer = params.print_note.as_ref().map(|note| PrintFooter {
            info: [
                first_line(params.invoice.as_deref()),
                first_line(params.receiver.as_deref()),
            ]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" - "),
            printed_at: options.printed_at,
            note: note.clone(),
        });

        Self {
            theme: Theme::from_name(params.theme.as_deref()),
            logo1,
            logo2,
            invoice: params.invoice.as_deref().map(style_block),
            date: params.date.clone(),
            time: params.time.clone(),
            payment_method: params.payment_method.clone(),
            sender: params.sender.as_deref().map(style_block),
            receiver: params.receiver.as_deref().map(style_block),
            table: TableView::new(&params.table),
            summary: summary_lines(params),
            note: params
                .note
                .as_ref()
                .map(|n| n.split('\n').map(str::to_string).collect()),
            print_footer,
        }
    }
}

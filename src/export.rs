// Spreadsheet / CSV rendering of the ranked table

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone};
use rust_xlsxwriter::Workbook;
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::config::Locale;
use crate::models::{DetailField, Listing};
use crate::normalize::{format_count, format_price};

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }
}

const HEADERS: [&str; 10] = [
    "Title",
    "Price (R$)",
    "Sold",
    "Condition",
    "Free shipping",
    "Full",
    "Created",
    "Link",
    "Image",
    "Page",
];

#[derive(Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "Title")]
    title: &'a str,
    #[serde(rename = "Price (R$)")]
    price: String,
    #[serde(rename = "Sold")]
    sold: String,
    #[serde(rename = "Condition")]
    condition: &'static str,
    #[serde(rename = "Free shipping")]
    free_shipping: &'static str,
    #[serde(rename = "Full")]
    fulfillment: &'static str,
    #[serde(rename = "Created")]
    created: String,
    #[serde(rename = "Link")]
    link: &'a str,
    #[serde(rename = "Image")]
    image: &'a str,
    #[serde(rename = "Page")]
    page: u32,
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

pub fn created_label<Tz: TimeZone>(created: &DetailField<DateTime<Tz>>, locale: &Locale) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match created.present() {
        Some(date) => date.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => locale.missing_label.clone(),
    }
}

impl<'a> ExportRow<'a> {
    fn new(listing: &'a Listing, locale: &Locale) -> Self {
        Self {
            title: &listing.title,
            price: format_price(listing.price, locale),
            sold: format_count(listing.sold, locale),
            condition: listing.condition.as_str(),
            free_shipping: yes_no(listing.free_shipping),
            fulfillment: yes_no(listing.fulfillment),
            created: created_label(&listing.created, locale),
            link: &listing.permalink,
            image: listing.thumbnail.as_deref().unwrap_or(""),
            page: listing.page,
        }
    }
}

pub fn write_csv<W: Write>(rows: &[Listing], locale: &Locale, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        wtr.write_record(HEADERS).context("Failed to write CSV header")?;
    }
    for listing in rows {
        wtr.serialize(ExportRow::new(listing, locale))
            .with_context(|| format!("Failed to write CSV row for {}", listing.id))?;
    }
    wtr.flush().context("Failed to flush CSV writer")?;
    Ok(())
}

pub fn to_csv(rows: &[Listing], locale: &Locale) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_csv(rows, locale, &mut buffer)?;
    Ok(buffer)
}

pub fn to_xlsx(rows: &[Listing], locale: &Locale) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Listings").context("Failed to name worksheet")?;

    for (col, header) in HEADERS.iter().enumerate() {
        worksheet
            .write_string(0, col as u16, *header)
            .with_context(|| format!("Failed to write header '{}'", header))?;
    }

    for (i, listing) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        let row = ExportRow::new(listing, locale);

        worksheet.write_string(r, 0, row.title).context("Failed to write title")?;
        // Numbers stay numeric so the sheet can be sorted; absent values are the sentinel text
        let price_cell = match listing.price {
            Some(price) => worksheet.write_number(r, 1, price),
            None => worksheet.write_string(r, 1, &row.price),
        };
        price_cell.context("Failed to write price")?;
        let sold_cell = match listing.sold {
            0 => worksheet.write_string(r, 2, &row.sold),
            sold => worksheet.write_number(r, 2, sold as f64),
        };
        sold_cell.context("Failed to write sold count")?;
        worksheet.write_string(r, 3, row.condition).context("Failed to write condition")?;
        worksheet.write_string(r, 4, row.free_shipping).context("Failed to write shipping flag")?;
        worksheet.write_string(r, 5, row.fulfillment).context("Failed to write fulfillment flag")?;
        worksheet.write_string(r, 6, &row.created).context("Failed to write creation date")?;
        worksheet.write_string(r, 7, row.link).context("Failed to write link")?;
        worksheet.write_string(r, 8, row.image).context("Failed to write image")?;
        worksheet.write_number(r, 9, row.page as f64).context("Failed to write page")?;
    }

    workbook.save_to_buffer().context("Failed to build XLSX workbook")
}

pub fn export(rows: &[Listing], locale: &Locale, format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Csv => to_csv(rows, locale),
        ExportFormat::Xlsx => to_xlsx(rows, locale),
    }
}

pub fn export_file_name<Tz: TimeZone>(format: ExportFormat, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("listings_report_{}.{}", now.format("%Y-%m-%d_%H-%M-%S"), format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Condition;
    use crate::ranking::tests::listing;
    use chrono::{FixedOffset, Utc};

    fn rows() -> Vec<Listing> {
        let mut first = listing("MLB1", Some(1234.5), 1200, Condition::New);
        first.title = "Lâmpada LED, 9W".to_string();
        first.free_shipping = true;
        first.created = DetailField::Present(
            DateTime::<FixedOffset>::parse_from_rfc3339("2023-05-01T10:30:00-03:00").unwrap(),
        );
        let mut second = listing("MLB2", None, 0, Condition::Used);
        second.created = DetailField::Failed("HTTP 500".to_string());
        vec![first, second]
    }

    #[test]
    fn csv_has_header_and_formatted_rows() {
        let csv = String::from_utf8(to_csv(&rows(), &Locale::default()).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Title,Price (R$),Sold,Condition,Free shipping,Full,Created,Link,Image,Page");
        assert_eq!(
            lines[1],
            r#""Lâmpada LED, 9W","1.234,50",1.200,new,Yes,No,2023-05-01 10:30:00,https://example.com/MLB1,,1"#
        );
        assert_eq!(lines[2], "Produto MLB2,N/A,N/A,used,No,No,N/A,https://example.com/MLB2,,1");
    }

    #[test]
    fn empty_csv_still_has_header() {
        let csv = String::from_utf8(to_csv(&[], &Locale::default()).unwrap()).unwrap();
        assert_eq!(csv.trim_end(), HEADERS.join(","));
    }

    #[test]
    fn xlsx_is_a_zip_container() {
        let bytes = to_xlsx(&rows(), &Locale::default()).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn file_name_carries_timestamp_and_extension() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(export_file_name(ExportFormat::Xlsx, &now), "listings_report_2024-03-09_14-05-07.xlsx");
        assert_eq!(export_file_name(ExportFormat::Csv, &now), "listings_report_2024-03-09_14-05-07.csv");
    }
}

mod common;

use serde_json::json;
use std::sync::Arc;
use tempfile::tempdir;

use common::{MemoryConnector, MemorySource};
use partner_export::app::export_use_case::ExportUseCase;
use partner_export::config::{ExportConfig, StatsConfig};
use partner_export::error::ExportError;
use partner_export::pipeline::processing::enrich::ExportFilters;
use partner_export::pipeline::processing::tabular::parse_table;

fn sample_source() -> MemorySource {
    MemorySource {
        partners: vec![
            json!({"id": 7, "name": "Zeta Traders", "street": "MG Road", "phone": "98765 43210",
                   "city": "Patna", "x_studio_sales_rep": "Manas", "comment": "<p>Pays&nbsp;cash</p><p>Visit Monday</p>"}),
            json!({"id": 3, "name": "Alpha, Sons & Co", "street": false, "phone": false,
                   "city": "Patna", "x_studio_sales_rep": [12, "Ravi"], "comment": false}),
            json!({"id": 9, "name": "Gaya Mart", "street": "Station Rd", "phone": "+91 91234 56789",
                   "city": "Gaya", "x_studio_sales_rep": "Manas", "comment": "Quote \"A\" only"}),
        ],
        orders: vec![
            json!({"partner_id": [7, "Zeta Traders"], "amount_total": 1200.5, "state": "sale"}),
            json!({"partner_id": [7, "Zeta Traders"], "amount_total": 300, "state": "done"}),
            json!({"partner_id": [7, "Zeta Traders"], "amount_total": 999, "state": "cancel"}),
            json!({"partner_id": [9, "Gaya Mart"], "amount_total": 50.25, "state": "sale"}),
            json!({"partner_id": false, "amount_total": 10, "state": "sale"}),
        ],
        fail_orders: false,
    }
}

fn use_case(connector: MemoryConnector, dir: &std::path::Path) -> ExportUseCase {
    let export = ExportConfig {
        output_dir: dir.to_string_lossy().into_owned(),
        ..ExportConfig::default()
    };
    ExportUseCase::new(Arc::new(connector), export, StatsConfig::default())
}

#[tokio::test]
async fn test_export_writes_enriched_rows_in_source_order() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let export = use_case(MemoryConnector::new(sample_source()), tmp.path());

    let outcome = export.export(&ExportFilters::default()).await?;
    assert_eq!(outcome.count, 3);
    assert!(outcome.filename.starts_with("partner_export_"));
    assert!(outcome.filename.ends_with(".csv"));

    let text = std::fs::read_to_string(&outcome.path)?;
    assert!(text.contains("\r\n"));
    let table = parse_table(&text, ',');
    assert_eq!(
        table.headers,
        vec!["id", "name", "street", "phone", "city", "x_studio_sales_rep", "comment", "order_count", "order_total"]
    );
    assert_eq!(table.rows.len(), 3);

    let col = |name: &str| table.column_index(name).unwrap();
    let names: Vec<&str> = table.rows.iter().map(|r| r[col("name")].as_str()).collect();
    assert_eq!(names, vec!["Zeta Traders", "Alpha, Sons & Co", "Gaya Mart"]);

    let zeta = &table.rows[0];
    assert_eq!(zeta[col("comment")], "Pays cash\nVisit Monday");
    assert_eq!(zeta[col("order_count")], "2");
    assert_eq!(zeta[col("order_total")], "1500.50");

    let alpha = &table.rows[1];
    assert_eq!(alpha[col("x_studio_sales_rep")], "Ravi");
    assert_eq!(alpha[col("comment")], "");
    assert_eq!(alpha[col("order_count")], "0");
    assert_eq!(alpha[col("order_total")], "0.00");

    assert_eq!(table.rows[2][col("comment")], "Quote \"A\" only");
    assert_eq!(table.rows[2][col("order_total")], "50.25");
    Ok(())
}

#[tokio::test]
async fn test_filters_narrow_the_partner_query() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let export = use_case(MemoryConnector::new(sample_source()), tmp.path());

    let rows = export
        .fetch_rows(&ExportFilters::new(Some("Patna".into()), Some("Manas".into())))
        .await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), "Zeta Traders");

    let capped = ExportFilters {
        max_rows: Some(2),
        ..ExportFilters::default()
    };
    assert_eq!(export.fetch_rows(&capped).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_no_matches_is_empty_result_and_writes_nothing() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let export = use_case(MemoryConnector::new(sample_source()), tmp.path());

    let err = export
        .export(&ExportFilters::new(Some("Ranchi".into()), None))
        .await
        .unwrap_err();
    assert!(err.is_empty_result());
    assert_eq!(err.to_string(), "No customers found with filters (city: Ranchi).");
    assert_eq!(std::fs::read_dir(tmp.path())?.count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_unreachable_source_is_reported() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let export = use_case(MemoryConnector::unreachable(), tmp.path());

    let err = export.export(&ExportFilters::default()).await.unwrap_err();
    assert!(matches!(err, ExportError::SourceUnavailable(_)));
    assert!(export.test_connection().await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_failing_order_query_exports_zero_statistics() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let source = MemorySource {
        fail_orders: true,
        ..sample_source()
    };
    let export = use_case(MemoryConnector::new(source), tmp.path());

    let rows = export.fetch_rows(&ExportFilters::default()).await?;
    assert_eq!(rows.len(), 3);
    for row in &rows {
        assert_eq!(row.get("order_count"), "0");
        assert_eq!(row.get("order_total"), "0.00");
    }
    Ok(())
}

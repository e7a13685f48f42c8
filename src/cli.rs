use crate::config::{AskArgs, OutputFormat};
use crate::db::executor::QueryResult;
use crate::pipeline::{Pipeline, QueryOutcome};
use std::error::Error;
use std::io::Write;
use tracing::info;

/// Runs one question against a database file and prints the outcome to stdout.
pub async fn run_ask(pipeline: &Pipeline, args: &AskArgs) -> Result<(), Box<dyn Error>> {
    let database = tokio::fs::read(&args.database).await?;
    info!("Read {} bytes from {}", database.len(), args.database.display());

    let outcome = pipeline.run(database, &args.question).await?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write_outcome(&mut out, &outcome, args.format)?;
    out.flush()?;
    Ok(())
}

pub fn write_outcome<W: Write>(
    out: &mut W,
    outcome: &QueryOutcome,
    format: OutputFormat,
) -> Result<(), Box<dyn Error>> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, outcome)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => write_csv(out, &outcome.result)?,
        OutputFormat::Table => {
            writeln!(out, "{}\n", outcome.sql)?;
            write_table(out, &outcome.result)?;
            writeln!(
                out,
                "\n({} rows, {} ms)",
                outcome.row_count, outcome.execution_time_ms
            )?;
        }
    }
    Ok(())
}

fn write_csv<W: Write>(out: &mut W, result: &QueryResult) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(&result.columns)?;
    for row in &result.rows {
        writer.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_table<W: Write>(out: &mut W, result: &QueryResult) -> std::io::Result<()> {
    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect();

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |values: &[String]| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(value, width)| format!("{:<width$}", value, width = *width))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    writeln!(out, "{}", line(&result.columns))?;
    writeln!(
        out,
        "{}",
        widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-")
    )?;
    for row in &cells {
        writeln!(out, "{}", line(row))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::executor::CellValue;

    fn outcome() -> QueryOutcome {
        QueryOutcome {
            sql: "SELECT id, customer FROM orders".to_string(),
            result: QueryResult {
                columns: vec!["id".to_string(), "customer".to_string()],
                rows: vec![
                    vec![CellValue::Integer(1), CellValue::Text("Smith, Al".to_string())],
                    vec![CellValue::Integer(20), CellValue::Null],
                ],
            },
            row_count: 2,
            execution_time_ms: 3,
        }
    }

    fn render(format: OutputFormat) -> String {
        let mut buf = Vec::new();
        write_outcome(&mut buf, &outcome(), format).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_csv_quotes_fields() {
        assert_eq!(
            render(OutputFormat::Csv),
            "id,customer\n1,\"Smith, Al\"\n20,NULL\n"
        );
    }

    #[test]
    fn test_table_alignment() {
        let text = render(OutputFormat::Table);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "SELECT id, customer FROM orders");
        assert_eq!(lines[2], "id | customer");
        assert_eq!(lines[3], "---+----------");
        assert_eq!(lines[4], "1  | Smith, Al");
        assert_eq!(lines[5], "20 | NULL");
        assert_eq!(lines[7], "(2 rows, 3 ms)");
    }

    #[test]
    fn test_json_shape() {
        let json: serde_json::Value = serde_json::from_str(&render(OutputFormat::Json)).unwrap();
        assert_eq!(json["sql"], "SELECT id, customer FROM orders");
        assert_eq!(json["rows"][1], serde_json::json!([20, null]));
        assert_eq!(json["row_count"], 2);
    }
}

use crate::{
    compositor::Compositor,
    error::{ImprintError, ImprintResult},
    model::Template,
    vars::{Bindings, extract_variable_names},
};

/// Parsed delimited input: one header row, then data rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Parse comma-delimited text: first line is the header, every following
/// non-empty line is one row. Cells split naively on `,` and are trimmed.
///
/// Known limitation: no quoting or escaping, so a comma inside a value is
/// not supported. Keep the format boring instead of guessing.
pub fn parse_table(raw: &str) -> ImprintResult<Table> {
    let mut lines = raw.lines().filter(|line| !line.trim().is_empty());

    let header_line = lines
        .next()
        .ok_or_else(|| ImprintError::validation("no batch data provided"))?;
    let headers: Vec<String> = header_line.split(',').map(|h| h.trim().to_string()).collect();

    let rows: Vec<Vec<String>> = lines
        .map(|line| line.split(',').map(|cell| cell.trim().to_string()).collect())
        .collect();
    if rows.is_empty() {
        return Err(ImprintError::validation(
            "batch input has a header but no data rows",
        ));
    }

    Ok(Table { headers, rows })
}

/// One successful batch output, in input-row order.
#[derive(Clone, Debug)]
pub struct GeneratedImage {
    pub id: String,
    pub png: Vec<u8>,
    pub bindings: Bindings,
}

/// Result of a batch run. `attempted` counts every data row; rows that fail
/// to render are skipped, so `images.len() == succeeded <= attempted`.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub images: Vec<GeneratedImage>,
    pub attempted: usize,
    pub succeeded: usize,
}

/// Render the template once per data row.
///
/// Rows are processed sequentially on purpose: memory stays bounded at one
/// in-flight render and output order trivially equals input order. A failing
/// row is logged and skipped, never fatal to the rest of the batch. The
/// template is borrowed for the whole run, so it cannot be edited mid-batch.
#[tracing::instrument(skip_all, fields(template = %template.id))]
pub fn run_batch(
    compositor: &mut Compositor,
    template: &Template,
    raw_table: &str,
) -> ImprintResult<BatchOutcome> {
    let table = parse_table(raw_table)?;
    let variables = extract_variable_names(template);

    let mut outcome = BatchOutcome::default();
    for (row_index, row) in table.rows.iter().enumerate() {
        outcome.attempted += 1;
        let bindings = bindings_for_row(&variables, &table.headers, row);

        match compositor.render_png(template, &bindings) {
            Ok((png, _)) => {
                outcome.succeeded += 1;
                outcome.images.push(GeneratedImage {
                    id: format!("row-{row_index}"),
                    png,
                    bindings,
                });
            }
            Err(err) => {
                tracing::warn!(row = row_index, %err, "batch row failed; skipping");
            }
        }
    }

    Ok(outcome)
}

/// Headers that match a known variable bind their cell value; known
/// variables without a column default to the empty string (which renders as
/// the placeholder); unmatched headers are ignored.
fn bindings_for_row(variables: &[String], headers: &[String], row: &[String]) -> Bindings {
    let mut bindings = Bindings::new();
    for name in variables {
        let value = headers
            .iter()
            .position(|h| h == name)
            .and_then(|col| row.get(col))
            .cloned()
            .unwrap_or_default();
        bindings.insert(name.clone(), value);
    }
    bindings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_table_trims_headers_and_cells() {
        let table = parse_table(" name , city \n Ada , London \nGrace,New York\n").unwrap();
        assert_eq!(table.headers, vec!["name", "city"]);
        assert_eq!(table.rows[0], vec!["Ada", "London"]);
        assert_eq!(table.rows[1], vec!["Grace", "New York"]);
    }

    #[test]
    fn parse_table_rejects_empty_input() {
        assert!(parse_table("").is_err());
        assert!(parse_table("   \n  \n").is_err());
        assert!(parse_table("name\n").is_err());
    }

    #[test]
    fn commas_inside_values_split_naively() {
        // Documented limitation: no quoting support.
        let table = parse_table("name\n\"Ada, Countess\"\n").unwrap();
        assert_eq!(table.rows[0], vec!["\"Ada", "Countess\""]);
    }

    #[test]
    fn bindings_ignore_unmatched_headers_and_default_missing_columns() {
        let variables = vec!["name".to_string(), "city".to_string()];
        let headers = vec!["name".to_string(), "irrelevant".to_string()];
        let row = vec!["Ada".to_string(), "junk".to_string()];

        let bindings = bindings_for_row(&variables, &headers, &row);
        assert_eq!(bindings.get("name").map(String::as_str), Some("Ada"));
        assert_eq!(bindings.get("city").map(String::as_str), Some(""));
        assert!(!bindings.contains_key("irrelevant"));
    }

    #[test]
    fn short_rows_default_missing_cells_to_empty() {
        let variables = vec!["a".to_string(), "b".to_string()];
        let headers = vec!["a".to_string(), "b".to_string()];
        let row = vec!["only-a".to_string()];

        let bindings = bindings_for_row(&variables, &headers, &row);
        assert_eq!(bindings.get("a").map(String::as_str), Some("only-a"));
        assert_eq!(bindings.get("b").map(String::as_str), Some(""));
    }
}

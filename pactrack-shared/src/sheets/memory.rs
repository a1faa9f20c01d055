/// In-process spreadsheet
///
/// Implements [`SheetsTransport`] over a grid of string cells per sheet, with
/// the range rules the Sheets API applies to the calls the storage backend
/// makes: reads drop trailing empty rows, appends write into the first empty
/// row after the table without moving anything, clears blank cells in place.
///
/// # Example
///
/// ```
/// use pactrack_shared::sheets::{InMemorySheets, SheetsTransport};
///
/// # async fn example() -> Result<(), pactrack_shared::sheets::SheetsError> {
/// let sheets = InMemorySheets::new();
/// sheets.add_sheet("users").await?;
/// let row = sheets
///     .append_values("users!A:C", vec![vec!["ivanova".into(), "hash".into(), "lawyer".into()]])
///     .await?;
/// assert_eq!(row, 1);
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{SheetsError, SheetsTransport};

type Grid = Vec<Vec<String>>;

/// A parsed A1 range; rows are 1-based, columns 0-based
#[derive(Debug, Clone, PartialEq, Eq)]
struct A1Range {
    sheet: String,
    first_col: usize,
    first_row: Option<usize>,
    last_col: usize,
    last_row: Option<usize>,
}

impl A1Range {
    fn parse(range: &str) -> Result<Self, SheetsError> {
        let invalid = || SheetsError::InvalidRange(range.to_string());

        let (sheet, cells) = range.rsplit_once('!').ok_or_else(invalid)?;
        let sheet = sheet.trim_matches('\'').to_string();
        let (first, last) = cells.split_once(':').unwrap_or((cells, cells));
        let (first_col, first_row) = parse_cell(first).ok_or_else(invalid)?;
        let (last_col, last_row) = parse_cell(last).ok_or_else(invalid)?;

        if sheet.is_empty() || last_col < first_col {
            return Err(invalid());
        }
        if let (Some(first), Some(last)) = (first_row, last_row) {
            if last < first {
                return Err(invalid());
            }
        }

        Ok(Self {
            sheet,
            first_col,
            first_row,
            last_col,
            last_row,
        })
    }

    fn width(&self) -> usize {
        self.last_col - self.first_col + 1
    }

    /// 0-based row index the range starts at
    fn start(&self) -> usize {
        self.first_row.map_or(0, |row| row - 1)
    }

    /// 0-based exclusive row index the range ends at, capped by the grid
    fn end(&self, grid_len: usize) -> usize {
        self.last_row.map_or(grid_len, |row| row.min(grid_len))
    }

    fn cells<'a>(&self, row: &'a [String]) -> impl Iterator<Item = &'a String> {
        row.iter().skip(self.first_col).take(self.width())
    }
}

/// `B12` → `(1, Some(12))`, `J` → `(9, None)`
fn parse_cell(cell: &str) -> Option<(usize, Option<usize>)> {
    let cell = cell.replace('$', "");
    let split = cell
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(cell.len());
    let (letters, digits) = cell.split_at(split);

    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let col = letters
        .chars()
        .fold(0usize, |acc, c| acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1))
        - 1;

    let row = if digits.is_empty() {
        None
    } else {
        match digits.parse::<usize>() {
            Ok(row) if row > 0 => Some(row),
            _ => return None,
        }
    };

    Some((col, row))
}

fn write_cells(grid: &mut Grid, row: usize, col: usize, values: Vec<String>) {
    if grid.len() <= row {
        grid.resize_with(row + 1, Vec::new);
    }
    let cells = &mut grid[row];
    if cells.len() < col + values.len() {
        cells.resize(col + values.len(), String::new());
    }
    for (offset, value) in values.into_iter().enumerate() {
        cells[col + offset] = value;
    }
}

/// Spreadsheet held in memory, keyed by sheet title
#[derive(Debug, Default)]
pub struct InMemorySheets {
    sheets: RwLock<BTreeMap<String, Grid>>,
}

impl InMemorySheets {
    pub fn new() -> Self {
        Self::default()
    }
}

fn unknown_sheet(range: &str) -> SheetsError {
    SheetsError::Api {
        status: 400,
        message: format!("Unable to parse range: {}", range),
    }
}

#[async_trait]
impl SheetsTransport for InMemorySheets {
    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        let a1 = A1Range::parse(range)?;
        let sheets = self.sheets.read().await;
        let grid = sheets.get(&a1.sheet).ok_or_else(|| unknown_sheet(range))?;

        let end = a1.end(grid.len());
        let mut rows: Grid = grid
            .get(a1.start()..end)
            .unwrap_or_default()
            .iter()
            .map(|row| {
                let mut cells: Vec<String> = a1.cells(row).cloned().collect();
                while cells.last().is_some_and(|c| c.is_empty()) {
                    cells.pop();
                }
                cells
            })
            .collect();

        while rows.last().is_some_and(Vec::is_empty) {
            rows.pop();
        }
        Ok(rows)
    }

    async fn append_values(&self, range: &str, rows: Vec<Vec<String>>) -> Result<u32, SheetsError> {
        let a1 = A1Range::parse(range)?;
        let mut sheets = self.sheets.write().await;
        let grid = sheets.get_mut(&a1.sheet).ok_or_else(|| unknown_sheet(range))?;

        let mut target = a1.start();
        while grid
            .get(target)
            .is_some_and(|row| a1.cells(row).any(|c| !c.trim().is_empty()))
        {
            target += 1;
        }

        for (offset, row) in rows.into_iter().enumerate() {
            write_cells(grid, target + offset, a1.first_col, row);
        }

        u32::try_from(target + 1).map_err(|_| SheetsError::InvalidRange(range.to_string()))
    }

    async fn update_values(&self, range: &str, rows: Vec<Vec<String>>) -> Result<(), SheetsError> {
        let a1 = A1Range::parse(range)?;
        let mut sheets = self.sheets.write().await;
        let grid = sheets.get_mut(&a1.sheet).ok_or_else(|| unknown_sheet(range))?;

        for (offset, row) in rows.into_iter().enumerate() {
            write_cells(grid, a1.start() + offset, a1.first_col, row);
        }
        Ok(())
    }

    async fn clear_values(&self, range: &str) -> Result<(), SheetsError> {
        let a1 = A1Range::parse(range)?;
        let mut sheets = self.sheets.write().await;
        let grid = sheets.get_mut(&a1.sheet).ok_or_else(|| unknown_sheet(range))?;

        let end = a1.end(grid.len());
        for row in grid.iter_mut().take(end).skip(a1.start()) {
            for cell in row.iter_mut().skip(a1.first_col).take(a1.width()) {
                cell.clear();
            }
        }
        Ok(())
    }

    async fn sheet_titles(&self) -> Result<Vec<String>, SheetsError> {
        Ok(self.sheets.read().await.keys().cloned().collect())
    }

    async fn add_sheet(&self, title: &str) -> Result<(), SheetsError> {
        let mut sheets = self.sheets.write().await;
        if sheets.contains_key(title) {
            return Err(SheetsError::Api {
                status: 400,
                message: format!("A sheet with the name \"{}\" already exists", title),
            });
        }
        sheets.insert(title.to_string(), Grid::new());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    async fn sheet_with_rows(rows: &[&[&str]]) -> InMemorySheets {
        let sheets = InMemorySheets::new();
        sheets.add_sheet("data").await.unwrap();
        sheets
            .update_values("data!A1:C1", rows.iter().map(|r| row(r)).collect())
            .await
            .unwrap();
        sheets
    }

    #[test]
    fn test_range_parsing() {
        let range = A1Range::parse("contracts!A2:J").unwrap();
        assert_eq!(range.sheet, "contracts");
        assert_eq!((range.first_col, range.first_row), (0, Some(2)));
        assert_eq!((range.last_col, range.last_row), (9, None));

        let range = A1Range::parse("'my sheet'!$AA$3").unwrap();
        assert_eq!(range.sheet, "my sheet");
        assert_eq!((range.first_col, range.first_row), (26, Some(3)));
        assert_eq!((range.last_col, range.last_row), (26, Some(3)));

        assert!(A1Range::parse("A1:B2").is_err());
        assert!(A1Range::parse("data!C1:A1").is_err());
        assert!(A1Range::parse("data!A0").is_err());
    }

    #[tokio::test]
    async fn test_reads_drop_trailing_blanks_only() {
        let sheets = sheet_with_rows(&[&["h1", "h2"], &["a", ""], &[], &["b", "c"], &[]]).await;

        let rows = sheets.get_values("data!A2:C").await.unwrap();
        assert_eq!(rows, vec![row(&["a"]), vec![], row(&["b", "c"])]);

        let rows = sheets.get_values("data!B1:B2").await.unwrap();
        assert_eq!(rows, vec![row(&["h2"])]);
    }

    #[tokio::test]
    async fn test_append_fills_first_gap_without_moving_rows() {
        let sheets = sheet_with_rows(&[&["h"], &["one"], &["two"], &["three"]]).await;
        sheets.clear_values("data!A3:C3").await.unwrap();

        let landed = sheets.append_values("data!A:C", vec![row(&["four"])]).await.unwrap();
        assert_eq!(landed, 3);

        let landed = sheets.append_values("data!A:C", vec![row(&["five"])]).await.unwrap();
        assert_eq!(landed, 5);

        let rows = sheets.get_values("data!A1:C").await.unwrap();
        assert_eq!(
            rows,
            vec![row(&["h"]), row(&["one"]), row(&["four"]), row(&["three"]), row(&["five"])]
        );
    }

    #[tokio::test]
    async fn test_unknown_and_duplicate_sheets() {
        let sheets = InMemorySheets::new();
        assert!(matches!(
            sheets.get_values("missing!A1").await,
            Err(SheetsError::Api { status: 400, .. })
        ));

        sheets.add_sheet("users").await.unwrap();
        assert!(sheets.add_sheet("users").await.is_err());
        assert_eq!(sheets.sheet_titles().await.unwrap(), vec!["users"]);
    }
}

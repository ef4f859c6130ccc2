// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::parsing::parse_cell;
use crate::domain::bundle::{BundleSlot, PriceSlot, TargetState, TargetTable};
use crate::domain::constants::POSITION_BUNDLE_SIZE;
use crate::domain::error::AppError;
use crate::services::reconcile::ports::TargetStateSource;
use async_trait::async_trait;
use csv_async::{AsyncReaderBuilder, StringRecord, Trim};
use futures::StreamExt;
use std::path::PathBuf;
use tokio::io::AsyncRead;

pub const TICK_HEADER: [&str; 5] = ["bundle index", "state", "lower", "upper", "liquidity"];
pub const PRICE_HEADER: [&str; 5] = ["bundle index", "state", "min price", "max price", "token amount"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Ticks,
    Prices,
}

fn layout_of(headers: &StringRecord) -> Result<Layout, AppError> {
    let found: Vec<&str> = headers.iter().collect();
    if found == TICK_HEADER {
        Ok(Layout::Ticks)
    } else if found == PRICE_HEADER {
        Ok(Layout::Prices)
    } else {
        Err(AppError::validation(
            "target table header",
            format!(
                "expected `{}` or `{}`, found `{}`",
                TICK_HEADER.join(","),
                PRICE_HEADER.join(","),
                found.join(",")
            ),
        ))
    }
}

/// Second column; anything but open/closed is rejected.
fn parse_state(row: usize, raw: &str) -> Result<bool, AppError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "open" => Ok(true),
        "closed" => Ok(false),
        _ => Err(AppError::validation(
            format!("row {row} state"),
            format!("{raw:?} is neither open nor closed"),
        )),
    }
}

fn column<'a>(record: &'a StringRecord, row: usize, at: usize, name: &str) -> Result<&'a str, AppError> {
    record
        .get(at)
        .ok_or_else(|| AppError::validation(format!("row {row} {name}"), "missing value"))
}

fn parse_tick_row(row: usize, record: &StringRecord) -> Result<BundleSlot, AppError> {
    if !parse_state(row, column(record, row, 1, "state")?)? {
        return Ok(BundleSlot::Closed);
    }
    Ok(BundleSlot::Open {
        lower: parse_cell(row, "lower", column(record, row, 2, "lower")?)?,
        upper: parse_cell(row, "upper", column(record, row, 3, "upper")?)?,
        liquidity: parse_cell(row, "liquidity", column(record, row, 4, "liquidity")?)?,
    })
}

fn parse_price_row(row: usize, record: &StringRecord) -> Result<PriceSlot, AppError> {
    if !parse_state(row, column(record, row, 1, "state")?)? {
        return Ok(PriceSlot::Closed);
    }
    let min_price: f64 = parse_cell(row, "min price", column(record, row, 2, "min price")?)?;
    let max_price: f64 = parse_cell(row, "max price", column(record, row, 3, "max price")?)?;
    let token_amount: f64 = parse_cell(row, "token amount", column(record, row, 4, "token amount")?)?;

    if !(min_price.is_finite() && min_price > 0.0) {
        return Err(AppError::validation(
            format!("row {row} min price"),
            format!("{min_price} must be a positive number"),
        ));
    }
    if !(max_price.is_finite() && max_price > min_price) {
        return Err(AppError::validation(
            format!("row {row} max price"),
            format!("{max_price} must be above min price {min_price}"),
        ));
    }
    if !(token_amount.is_finite() && token_amount >= 0.0) {
        return Err(AppError::validation(
            format!("row {row} token amount"),
            format!("{token_amount} must be a non-negative number"),
        ));
    }
    Ok(PriceSlot::Open {
        min_price,
        max_price,
        token_amount,
    })
}

/// Parse and validate a full target table. Bounds of tick rows are checked
/// against `tick_spacing`; price rows are resolved later against the pool.
pub async fn parse_target_table<R>(input: R, tick_spacing: u16) -> Result<TargetTable, AppError>
where
    R: AsyncRead + Unpin + Send,
{
    let mut reader = AsyncReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::Fields)
        .create_reader(input);
    let layout = layout_of(reader.headers().await?)?;

    let mut ticks = Vec::with_capacity(POSITION_BUNDLE_SIZE);
    let mut prices = Vec::with_capacity(POSITION_BUNDLE_SIZE);
    let mut row = 0usize;
    let mut records = reader.records();
    while let Some(record) = records.next().await {
        let record = record?;
        if row >= POSITION_BUNDLE_SIZE {
            return Err(AppError::validation(
                "target table",
                format!("more than {POSITION_BUNDLE_SIZE} data rows"),
            ));
        }
        let index: usize = parse_cell(row, "bundle index", column(&record, row, 0, "bundle index")?)?;
        if index != row {
            return Err(AppError::validation(
                format!("row {row} bundle index"),
                format!("expected {row}, found {index}"),
            ));
        }
        match layout {
            Layout::Ticks => ticks.push(parse_tick_row(row, &record)?),
            Layout::Prices => prices.push(parse_price_row(row, &record)?),
        }
        row += 1;
    }

    if row != POSITION_BUNDLE_SIZE {
        return Err(AppError::validation(
            "target table",
            format!("expected {POSITION_BUNDLE_SIZE} data rows, found {row}"),
        ));
    }

    let table = match layout {
        Layout::Ticks => TargetTable::Ticks(TargetState::new(ticks, tick_spacing)?),
        Layout::Prices => TargetTable::Prices(prices),
    };
    tracing::debug!(
        target: "target_table",
        layout = ?layout,
        open = table.open_count(),
        "Target table parsed"
    );
    Ok(table)
}

/// Target-state source backed by a CSV file on disk.
#[derive(Debug, Clone)]
pub struct CsvTargetSource {
    path: PathBuf,
    tick_spacing: u16,
}

impl CsvTargetSource {
    pub fn new(path: impl Into<PathBuf>, tick_spacing: u16) -> Self {
        Self {
            path: path.into(),
            tick_spacing,
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl TargetStateSource for CsvTargetSource {
    async fn load(&self) -> Result<TargetTable, AppError> {
        let file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| AppError::Config(format!("target table {}: {e}", self.path.display())))?;
        parse_target_table(file, self.tick_spacing).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick_table(overrides: &[(usize, &str)]) -> String {
        let mut out = format!("{}\n", TICK_HEADER.join(","));
        for i in 0..POSITION_BUNDLE_SIZE {
            match overrides.iter().find(|(idx, _)| *idx == i) {
                Some((_, row)) => out.push_str(&format!("{i},{row}\n")),
                None => out.push_str(&format!("{i},closed,,,\n")),
            }
        }
        out
    }

    async fn parse(body: &str, spacing: u16) -> Result<TargetTable, AppError> {
        parse_target_table(body.as_bytes(), spacing).await
    }

    fn field_of(err: AppError) -> String {
        match err {
            AppError::Validation { field, .. } => field,
            other => panic!("Unexpected error variant: {other:?}"),
        }
    }

    #[tokio::test]
    async fn parses_tick_rows_and_ignores_closed_columns() {
        let body = tick_table(&[(5, "OPEN,-1000,1000,500"), (6, "Closed,garbage,x,y")]);
        let table = parse(&body, 8).await.unwrap();
        let TargetTable::Ticks(state) = table else {
            panic!("expected tick table");
        };
        assert_eq!(
            state.slot(5),
            BundleSlot::Open {
                lower: -1000,
                upper: 1000,
                liquidity: 500
            }
        );
        assert_eq!(state.slot(6), BundleSlot::Closed);
        assert_eq!(state.open_count(), 1);
    }

    #[tokio::test]
    async fn misaligned_bound_is_rejected() {
        let body = tick_table(&[(12, "open,-1000,1001,500")]);
        let field = field_of(parse(&body, 8).await.unwrap_err());
        assert_eq!(field, "slot 12 upper");
    }

    #[tokio::test]
    async fn header_must_match_exactly() {
        let body = tick_table(&[]).replacen("liquidity", "liq", 1);
        assert_eq!(field_of(parse(&body, 8).await.unwrap_err()), "target table header");

        let padded = tick_table(&[]).replacen("bundle index,state", " bundle index , state ", 1);
        assert_eq!(field_of(parse(&padded, 8).await.unwrap_err()), "target table header");

        let spaced_cells = tick_table(&[(2, " open , -8 , 8 , 5 ")]);
        assert_eq!(parse(&spaced_cells, 8).await.unwrap().open_count(), 1);
    }

    #[tokio::test]
    async fn row_count_and_order_are_enforced() {
        let short: String = tick_table(&[]).lines().take(POSITION_BUNDLE_SIZE).collect::<Vec<_>>().join("\n");
        assert_eq!(field_of(parse(&short, 8).await.unwrap_err()), "target table");

        let swapped = tick_table(&[]).replacen("\n3,closed", "\n4,closed", 1);
        assert_eq!(field_of(parse(&swapped, 8).await.unwrap_err()), "row 3 bundle index");
    }

    #[tokio::test]
    async fn unknown_state_is_rejected() {
        let body = tick_table(&[(9, "pending,0,8,1")]);
        assert_eq!(field_of(parse(&body, 8).await.unwrap_err()), "row 9 state");
    }

    #[tokio::test]
    async fn price_rows_are_validated() {
        let mut body = format!("{}\n", PRICE_HEADER.join(","));
        for i in 0..POSITION_BUNDLE_SIZE {
            if i == 1 {
                body.push_str("1,open,0.5,2.5,10.25\n");
            } else {
                body.push_str(&format!("{i},closed,,,\n"));
            }
        }
        let table = parse(&body, 64).await.unwrap();
        let TargetTable::Prices(rows) = &table else {
            panic!("expected price table");
        };
        assert_eq!(
            rows[1],
            PriceSlot::Open {
                min_price: 0.5,
                max_price: 2.5,
                token_amount: 10.25
            }
        );

        let inverted = body.replacen("1,open,0.5,2.5", "1,open,2.5,0.5", 1);
        assert_eq!(field_of(parse(&inverted, 64).await.unwrap_err()), "row 1 max price");
    }

    #[tokio::test]
    async fn missing_file_is_config_error() {
        let source = CsvTargetSource::new("/nonexistent/target_table.csv", 8);
        assert!(matches!(source.load().await.unwrap_err(), AppError::Config(_)));
    }
}

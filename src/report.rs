/*!
Tabular presentation of simulation results

Every result record of the crate can be turned into a [`ResultsTable`], whose
[`Display`] implementation renders it as CSV or as a human-readable table.

```
use poem_sim::prelude::*;

let sweep = ParameterSweep::builder()
    .betas([0.1, 0.2])
    .gs([0.5, 1.0])
    .trials(20)
    .horizon(20)
    .build()
    .unwrap();

let record = sweep.run().unwrap();
let table = ResultsTable::from_sweep(&record).with_format(Format::CSV);

println!("{}", table);
```
*/

use std::fmt::Display;

use crate::{
    backbone::BackboneSummary,
    latency::LatencyEstimate,
    sweep::{ComparisonRecord, SweepAxis, SweepRecord},
};

/// Floating point precision of results data.
pub const FLOAT_PRECISION_DIGITS: usize = 6;

/// Describes the appearance of a [`ResultsTable`] table as given by its
/// [`Display`] implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Format {
    /// Comma-separated, without extra whitespace.
    #[cfg_attr(feature = "cli", value(name = "csv"))]
    CSV,
    /// Human-readable.
    #[default]
    #[cfg_attr(feature = "cli", value(name = "pretty"))]
    PrettyPrint,
}

/// Formatted results of an estimate, sweep or backbone execution. The table
/// is given by the struct's [`Display`] implementation, as specified by its
/// [`Format`].
#[derive(Debug, Clone)]
pub struct ResultsTable {
    columns: Vec<Column>,
    format: Format,
    rows: Vec<Vec<ColumnValue>>,
}

impl ResultsTable {
    const SEPARATOR_VERTICAL: char = '|';
    const SEPARATOR_HORIZONTAL: char = '-';

    /// One row per axis point of `record`.
    pub fn from_sweep(record: &SweepRecord) -> Self {
        let columns = Self::sweep_columns(record.axis, false);
        let rows = Self::sweep_rows(record, false);

        ResultsTable {
            columns,
            format: Format::default(),
            rows,
        }
    }

    /// One row per axis point and protocol of `record`.
    pub fn from_comparison(record: &ComparisonRecord) -> Self {
        let columns = Self::sweep_columns(SweepAxis::Beta, true);
        let mut rows = Self::sweep_rows(&record.nakamoto, true);
        rows.extend(Self::sweep_rows(&record.entropy_weighted, true));

        ResultsTable {
            columns,
            format: Format::default(),
            rows,
        }
    }

    /// A single row describing `estimate`.
    pub fn from_estimate(estimate: &LatencyEstimate) -> Self {
        use Column::*;
        use ColumnValue::*;

        let columns = vec![
            ProtocolName,
            Beta,
            G,
            Gamma,
            Latency,
            Confirmation,
            Failures,
            Throughput,
            CompletionTime,
            HonestWork,
            HonestHeight,
            AdversaryWork,
            AdversaryHeight,
        ];
        let row = vec![
            Text(estimate.protocol.to_string()),
            Float(estimate.beta),
            Float(estimate.g),
            Float(estimate.gamma),
            Float(estimate.latency),
            Depth(estimate.confirmation.depth()),
            Count(estimate.failures as u64),
            Float(estimate.throughput),
            Float(estimate.mean_completion_time),
            Float(estimate.mean_honest_work),
            Float(estimate.mean_honest_height),
            Float(estimate.mean_adversary_work),
            Float(estimate.mean_adversary_height),
        ];

        ResultsTable {
            columns,
            format: Format::default(),
            rows: vec![row],
        }
    }

    /// A single row describing `summary`.
    pub fn from_backbone(summary: &BackboneSummary) -> Self {
        use Column::*;
        use ColumnValue::*;

        let columns = vec![
            Adversary,
            Executions,
            Rounds,
            QuerySuccess,
            MeanCommonPrefix,
            MaxCommonPrefix,
            MeanHeight,
        ];
        let row = vec![
            Text(summary.adversary.clone()),
            Count(summary.executions as u64),
            Count(summary.rounds),
            Float(summary.query_success),
            Float(summary.mean_common_prefix),
            Count(summary.max_common_prefix),
            Float(summary.mean_height),
        ];

        ResultsTable {
            columns,
            format: Format::default(),
            rows: vec![row],
        }
    }

    fn sweep_columns(axis: SweepAxis, with_protocol: bool) -> Vec<Column> {
        use Column::*;

        let mut columns = vec![];
        if with_protocol {
            columns.push(ProtocolName);
        }
        columns.push(Axis(axis));
        if axis != SweepAxis::Beta {
            columns.push(Beta);
        }
        columns.extend([
            Latency,
            OptimalG,
            OptimalGamma,
            Confirmation,
            Throughput,
            CompletionTime,
            HonestWork,
            HonestHeight,
            AdversaryWork,
            AdversaryHeight,
        ]);

        columns
    }

    fn sweep_rows(
        record: &SweepRecord,
        with_protocol: bool,
    ) -> Vec<Vec<ColumnValue>> {
        use ColumnValue::*;

        (0..record.len())
            .map(|i| {
                let mut row = vec![];
                if with_protocol {
                    row.push(Text(record.protocol.to_string()));
                }
                row.push(Float(record.axis_values[i]));
                if record.axis != SweepAxis::Beta {
                    row.push(Float(record.beta[i]));
                }
                row.extend([
                    Float(record.latency[i]),
                    Float(record.optimal_g[i]),
                    Float(record.optimal_gamma[i]),
                    Depth(record.optimal_k[i]),
                    Float(record.throughput[i]),
                    Float(record.completion_time[i]),
                    Float(record.honest_work[i]),
                    Float(record.honest_height[i]),
                    Float(record.adversary_work[i]),
                    Float(record.adversary_height[i]),
                ]);

                row
            })
            .collect()
    }

    /// Specify the [`Format`] of the results table.
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;

        self
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn set_format(&mut self, format: Format) {
        self.format = format;
    }

    /// Number of data rows, excluding the title row.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }
}

impl ResultsTable {
    /// Title row followed by every data row, rendered as text.
    fn cells(&self) -> Vec<Vec<String>> {
        let titles: Vec<String> =
            self.columns.iter().map(|col| col.to_string()).collect();
        let values = self
            .rows
            .iter()
            .map(|row| row.iter().map(|val| val.to_string()).collect());

        std::iter::once(titles).chain(values).collect()
    }

    /// Writes one line of cells, padded to `widths` when given and
    /// comma-separated otherwise.
    fn write_line(
        f: &mut std::fmt::Formatter<'_>,
        line: &[String],
        widths: Option<&[usize]>,
    ) -> std::fmt::Result {
        match widths {
            None => write!(f, "{}", line.join(",")),
            Some(widths) => {
                for (cell, &w) in line.iter().zip(widths) {
                    write!(f, " {cell:w$} {}", Self::SEPARATOR_VERTICAL)?;
                }
                Ok(())
            }
        }
    }
}

impl Display for ResultsTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cells = self.cells();
        let widths = match self.format {
            Format::CSV => None,
            Format::PrettyPrint => {
                let mut widths = vec![0; self.columns.len()];
                for line in cells.iter() {
                    for (w, cell) in widths.iter_mut().zip(line) {
                        *w = cell.len().max(*w);
                    }
                }
                Some(widths)
            }
        };

        let (titles, rows) = cells.split_first().ok_or(std::fmt::Error)?;
        Self::write_line(f, titles, widths.as_deref())?;

        if let Some(widths) = &widths {
            let rule_width = widths.iter().map(|w| w + 3).sum();
            let rule = Self::SEPARATOR_HORIZONTAL.to_string();
            write!(f, "\n{}", rule.repeat(rule_width))?;
        }

        for row in rows {
            writeln!(f)?;
            Self::write_line(f, row, widths.as_deref())?;
        }

        Ok(())
    }
}

/// Type of column that can appear in a results table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    ProtocolName,
    Axis(SweepAxis),
    Beta,
    G,
    Gamma,
    Latency,
    OptimalG,
    OptimalGamma,
    Confirmation,
    Failures,
    Throughput,
    CompletionTime,
    HonestWork,
    HonestHeight,
    AdversaryWork,
    AdversaryHeight,
    Adversary,
    Executions,
    Rounds,
    QuerySuccess,
    MeanCommonPrefix,
    MaxCommonPrefix,
    MeanHeight,
}

/// Value which corresponds to a [`Column`].
#[derive(Debug, Clone, PartialEq)]
enum ColumnValue {
    Text(String),
    Float(f64),
    Count(u64),
    /// Confirmation depth, `None` when the horizon was too small.
    Depth(Option<u64>),
}

impl Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            Self::ProtocolName => write!(f, "Protocol"),
            Self::Axis(axis) => write!(f, "{}", axis),
            Self::Beta => write!(f, "Beta"),
            Self::G => write!(f, "g"),
            Self::Gamma => write!(f, "Gamma"),
            Self::Latency => write!(f, "Latency"),
            Self::OptimalG => write!(f, "Optimal g"),
            Self::OptimalGamma => write!(f, "Optimal Gamma"),
            Self::Confirmation => write!(f, "k"),
            Self::Failures => write!(f, "Failures"),
            Self::Throughput => write!(f, "Throughput"),
            Self::CompletionTime => write!(f, "Completion Time"),
            Self::HonestWork => write!(f, "Honest Work"),
            Self::HonestHeight => write!(f, "Honest Height"),
            Self::AdversaryWork => write!(f, "Adversary Work"),
            Self::AdversaryHeight => write!(f, "Adversary Height"),
            Self::Adversary => write!(f, "Adversary"),
            Self::Executions => write!(f, "Executions"),
            Self::Rounds => write!(f, "Rounds"),
            Self::QuerySuccess => write!(f, "Query Success"),
            Self::MeanCommonPrefix => write!(f, "Mean Common Prefix"),
            Self::MaxCommonPrefix => write!(f, "Max Common Prefix"),
            Self::MeanHeight => write!(f, "Mean Height"),
        }
    }
}

impl Display for ColumnValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            Self::Text(text) => write!(f, "{}", text),
            Self::Float(value) if !value.is_finite() => write!(f, "inf"),
            Self::Float(value) => {
                write!(f, "{:.1$}", value, FLOAT_PRECISION_DIGITS)
            }
            Self::Count(n) => write!(f, "{}", n),
            Self::Depth(Some(k)) => write!(f, "{}", k),
            Self::Depth(None) => write!(f, "inf"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{latency::Confirmation, work::Protocol};

    fn record(protocol: Protocol, axis: SweepAxis) -> SweepRecord {
        SweepRecord {
            protocol,
            axis,
            epsilon: 0.1,
            trials: 10,
            horizon: 100,
            seed: 0,
            axis_values: vec![0.1, 0.2],
            beta: vec![0.1, 0.2],
            latency: vec![12.5, f64::INFINITY],
            optimal_g: vec![1.0, 1.0],
            optimal_gamma: vec![0.0, 0.0],
            optimal_k: vec![Some(5), None],
            throughput: vec![0.4, 0.4],
            completion_time: vec![250.0, 250.0],
            honest_work: vec![100.0, 100.0],
            honest_height: vec![100.0, 100.0],
            adversary_work: vec![30.0, 60.0],
            adversary_height: vec![30.0, 60.0],
        }
    }

    #[test]
    fn csv_has_one_row_per_point() {
        let table = ResultsTable::from_sweep(&record(
            Protocol::Nakamoto,
            SweepAxis::Beta,
        ))
        .with_format(Format::CSV);
        let text = table.to_string();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(table.num_rows(), 2);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("beta,Latency,Optimal g"));
        assert!(
            lines[1].starts_with("0.100000,12.500000,1.000000,0.000000,5,")
        );
        assert!(lines[2].starts_with("0.200000,inf,1.000000,0.000000,inf,"));
    }

    #[test]
    fn pretty_print_aligns_columns() {
        let table =
            ResultsTable::from_sweep(&record(Protocol::Nakamoto, SweepAxis::G));
        let text = table.to_string();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with(" g "));
        assert!(lines[1].chars().all(|c| c == '-'));
        assert_eq!(lines[0].len(), lines[1].len());
        assert_eq!(lines[2].len(), lines[1].len());
        assert_eq!(
            lines[0].matches('|').count(),
            lines[2].matches('|').count()
        );
    }

    #[test]
    fn pretty_print_pads_cells_to_widest_value() {
        let table = ResultsTable::from_sweep(&record(
            Protocol::Nakamoto,
            SweepAxis::Beta,
        ))
        .with_format(Format::PrettyPrint);
        let text = table.to_string();
        let lines: Vec<_> = text.lines().collect();

        assert!(lines[0].starts_with(" beta     | Latency   | Optimal g |"));
        assert!(lines[2].starts_with(" 0.100000 | 12.500000 | 1.000000  |"));
        assert!(lines[3].starts_with(" 0.200000 | inf       | 1.000000  |"));
    }

    #[test]
    fn comparison_rows_are_labelled() {
        let comparison = ComparisonRecord {
            beta: vec![0.1, 0.2],
            nakamoto: record(Protocol::Nakamoto, SweepAxis::Beta),
            entropy_weighted: record(
                Protocol::EntropyWeighted,
                SweepAxis::Beta,
            ),
            speedup: vec![1.0, f64::NAN],
        };
        let table =
            ResultsTable::from_comparison(&comparison).with_format(Format::CSV);
        let text = table.to_string();

        assert_eq!(table.num_rows(), 4);
        assert_eq!(text.matches("\nNakamoto,").count(), 2);
        assert_eq!(text.matches("\nPoEM,").count(), 2);
    }

    #[test]
    fn estimate_table() {
        let estimate = LatencyEstimate {
            protocol: Protocol::EntropyWeighted,
            g: 0.7,
            beta: 0.3,
            gamma: 1.0,
            epsilon: 0.1,
            trials: 100,
            horizon: 50,
            confirmation: Confirmation::Depth(12),
            latency: 30.0,
            mean_completion_time: 125.0,
            mean_honest_work: 50.5,
            mean_honest_height: 20.0,
            mean_adversary_work: 30.0,
            mean_adversary_height: 12.0,
            throughput: 0.404,
            failures: 3,
        };
        let text = ResultsTable::from_estimate(&estimate)
            .with_format(Format::CSV)
            .to_string();

        assert!(text
            .contains("\nPoEM,0.300000,0.700000,1.000000,30.000000,12,3,"));
    }
}

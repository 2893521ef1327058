//! trak history command implementation.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::history::HistoryRecord;
use crate::output::{emit_success, HumanOutput, OutputOptions};

pub struct HistoryOptions {
    pub task: String,
    pub limit: Option<usize>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

#[derive(serde::Serialize)]
struct HistoryOutput {
    task: String,
    total: usize,
    records: Vec<HistoryRecord>,
}

pub fn run(options: HistoryOptions) -> Result<()> {
    if let Some(limit) = options.limit {
        if limit == 0 {
            return Err(Error::InvalidArgument("limit must be >= 1".to_string()));
        }
    }

    let graph = super::open_graph(options.root)?;
    let view = graph.get_task(&options.task)?;
    let records = graph.history_for(&view.task.id, options.limit)?;

    let output = HistoryOutput {
        task: view.task.id.clone(),
        total: records.len(),
        records: records.clone(),
    };

    let mut human = HumanOutput::new(format!("History: {} {}", view.task.id, view.task.title));
    human.push_summary("Total", records.len().to_string());
    for record in &records {
        let mut line = format!(
            "{} [{}] {}",
            record.timestamp.to_rfc3339(),
            record.action,
            record.description
        );
        line.push_str(&format!(" (by {})", record.actor));
        human.push_detail(line);
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "history",
        &output,
        Some(&human),
    )
}

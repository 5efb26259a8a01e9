//! Colored terminal rendering for omnical-core types.

use omnical_core::config::SyncPass;
use omnical_core::sync::{ActionKind, Plan, PlannedChange, RunSummary, SideCounts};
use owo_colors::OwoColorize;

/// Extension trait for TUI rendering with colors.
pub trait Render {
    fn render(&self) -> String;
}

impl Render for ActionKind {
    fn render(&self) -> String {
        let symbol = self.to_string();
        match self {
            ActionKind::Create => symbol.green().to_string(),
            ActionKind::Update => symbol.yellow().to_string(),
            ActionKind::Delete => symbol.red().to_string(),
            ActionKind::Noop => symbol.dimmed().to_string(),
        }
    }
}

impl Render for PlannedChange {
    fn render(&self) -> String {
        let kind = self.action.kind();
        let text = format!("{} {}", self.uid, self.action);
        let text = match kind {
            ActionKind::Create => text.green().to_string(),
            ActionKind::Update => text.yellow().to_string(),
            ActionKind::Delete => text.red().to_string(),
            ActionKind::Noop => text.dimmed().to_string(),
        };
        format!("{} {}", kind.render(), text)
    }
}

impl Render for SyncPass {
    fn render(&self) -> String {
        format!(
            "📅 {} → {} {}",
            self.source,
            self.target,
            format!("({})", self.policy.mode).dimmed()
        )
    }
}

/// Above this many changes, only counts are shown.
const COMPACT_THRESHOLD: usize = 10;

pub fn render_plan(plan: &Plan, verbose: bool) -> String {
    let mutations: Vec<&PlannedChange> = plan.mutations().collect();
    let mut lines = Vec::new();

    if mutations.is_empty() {
        lines.push("   No changes".dimmed().to_string());
    } else if verbose || mutations.len() <= COMPACT_THRESHOLD {
        for change in &mutations {
            lines.push(format!("   {}", change.render()));
        }
    } else {
        for kind in [ActionKind::Delete, ActionKind::Create, ActionKind::Update] {
            let count = mutations.iter().filter(|c| c.action.kind() == kind).count();
            if count > 0 {
                lines.push(format!(
                    "   {} {}",
                    kind.render(),
                    format!("({count} {})", pluralize("event", count)).dimmed()
                ));
            }
        }
    }

    for conflict in &plan.conflicts {
        lines.push(format!(
            "   {} {} changed on both sides at {}, keeping A",
            "!".yellow(),
            conflict.uid,
            conflict.modified.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")
        ));
    }

    if !plan.skipped.is_empty() {
        lines.push(
            format!("   {} skipped", plan.skipped.len())
                .dimmed()
                .to_string(),
        );
    }

    lines.join("\n")
}

fn render_counts(label: &str, counts: &SideCounts) -> Option<String> {
    if counts.changed() == 0 && counts.failed == 0 {
        return None;
    }

    let mut line = format!(
        "   {label}: {} created, {} updated, {} deleted",
        counts.created, counts.updated, counts.deleted
    );
    if counts.failed > 0 {
        line.push_str(&format!(", {}", format!("{} failed", counts.failed).red()));
    }
    Some(line)
}

impl Render for RunSummary {
    fn render(&self) -> String {
        let mut lines: Vec<String> = [render_counts("A", &self.a), render_counts("B", &self.b)]
            .into_iter()
            .flatten()
            .collect();

        if lines.is_empty() && self.failures.is_empty() {
            lines.push("   No changes".dimmed().to_string());
        }

        for failure in &self.failures {
            lines.push(format!(
                "   {} {} ({}, {}): {}",
                "✗".red(),
                failure.uid,
                failure.action,
                failure.kind,
                failure.message.red()
            ));
        }

        for conflict in &self.conflicts {
            lines.push(format!(
                "   {} {} changed on both sides, kept A",
                "!".yellow(),
                conflict.uid
            ));
        }

        let skipped = self.a.skipped + self.b.skipped;
        if skipped > 0 {
            lines.push(format!("   {skipped} skipped").dimmed().to_string());
        }

        if self.cancelled {
            lines.push("   Cancelled".yellow().to_string());
        }

        lines.join("\n")
    }
}

fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}

//! Inspect command implementation.

use crate::workspace::Workspace;
use tasksync_model::Snapshot;
use tasksync_store::SnapshotStore;

/// Runs the inspect command.
pub fn run(workspace: &Workspace, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = workspace
        .snapshot_store()?
        .load()?
        .ok_or_else(|| format!("No snapshot stored in {}", workspace.data_dir().display()))?;

    match format {
        "json" => println!("{}", snapshot.to_json_pretty()?),
        _ => print!("{}", render_text(&snapshot)),
    }
    Ok(())
}

/// Human-readable dump of a snapshot.
pub fn render_text(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Snapshot version {} (last modified {})\n",
        snapshot.version, snapshot.last_modified
    ));

    out.push_str(&format!("\nCategories ({}):\n", snapshot.categories.len()));
    for category in &snapshot.categories {
        out.push_str(&format!("  {} {} {}\n", category.id, category.name, category.color));
        for sub in &category.subcategories {
            out.push_str(&format!("    - {} {}\n", sub.id, sub.name));
        }
    }

    out.push_str(&format!("\nTasks ({}):\n", snapshot.tasks.len()));
    for task in &snapshot.tasks {
        let mark = if task.completed { "x" } else { " " };
        out.push_str(&format!(
            "  [{mark}] {} {} ({})\n",
            task.id, task.title, task.category_id
        ));
    }

    out.push_str(&format!("\nTime blocks ({}):\n", snapshot.time_blocks.len()));
    for block in &snapshot.time_blocks {
        let active = if snapshot.active_block_id.as_deref() == Some(block.id.as_str()) {
            " (active)"
        } else {
            ""
        };
        out.push_str(&format!(
            "  {} {}{}: {} tasks\n",
            block.id,
            block.name,
            active,
            block.task_ids.len()
        ));
    }

    out.push_str(&format!(
        "\nPomodoro sessions: {}\n",
        snapshot.pomodoro_sessions.len()
    ));
    out.push_str(&format!(
        "Streak: current {}, longest {}, {} completion days\n",
        snapshot.streak.current_streak,
        snapshot.streak.longest_streak,
        snapshot.streak.completion_dates.len()
    ));
    out.push_str(&format!("Chain entries: {}\n", snapshot.chain_data.len()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasksync_testkit::SnapshotBuilder;

    #[test]
    fn text_lists_entities() {
        let snapshot = SnapshotBuilder::new()
            .version(2)
            .subcategory("work", "deep")
            .completed_task("t1", 1, 2)
            .time_block("b1", 1, &["t1"])
            .active_block("b1")
            .build();

        let text = render_text(&snapshot);
        assert!(text.contains("Snapshot version 2"));
        assert!(text.contains("[x] t1"));
        assert!(text.contains("- deep"));
        assert!(text.contains("b1 Block b1 (active): 1 tasks"));
    }

    #[test]
    fn missing_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(&Workspace::new(Some(dir.path().to_path_buf())), "text").is_err());
    }
}

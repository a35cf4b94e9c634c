//! The `skillscope mock-data` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use skillscope_store::{generate_mock_data, load_config_from, MockDataOptions};

pub fn execute(
    config_path: Option<PathBuf>,
    students: usize,
    quizzes: usize,
    seed: Option<u64>,
    output: Option<PathBuf>,
) -> Result<()> {
    anyhow::ensure!(students >= 1, "students must be at least 1");
    anyhow::ensure!(quizzes >= 1, "quizzes must be at least 1");

    let path = match output {
        Some(path) => path,
        None => load_config_from(config_path.as_deref())?.data_path,
    };

    let options = MockDataOptions {
        students,
        quizzes_per_student: quizzes,
        seed,
        ..MockDataOptions::default()
    };
    let dataset = generate_mock_data(&options);
    dataset
        .save(&path)
        .with_context(|| format!("failed to write dataset: {}", path.display()))?;

    println!(
        "Generated {} students and {} quiz attempts in {}",
        dataset.students.len(),
        dataset.quiz_history.len(),
        path.display()
    );
    if let Some(metadata) = &dataset.metadata {
        let mut archetypes: Vec<_> = metadata.archetype_distribution.iter().collect();
        archetypes.sort();
        for (name, count) in archetypes {
            println!("  {name}: {count}");
        }
    }
    println!(
        "Class roster: {} / {}",
        options.teacher_id, options.class_id
    );
    Ok(())
}

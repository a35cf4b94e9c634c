//! skillscope CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "skillscope",
    version,
    about = "Learning analytics for quiz-based courses"
)]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Per-topic competency for a student
    Competency {
        #[arg(long)]
        student: String,

        /// Only analyse this topic
        #[arg(long)]
        topic: Option<String>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Recommend topics to study next
    Recommend {
        #[arg(long)]
        student: String,

        /// Number of recommendations (1-20)
        #[arg(long, default_value = "5")]
        count: usize,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Build an adaptive quiz for a student and topic
    Quiz {
        #[arg(long)]
        student: String,

        #[arg(long)]
        topic: String,

        /// Number of questions (1-50)
        #[arg(long, default_value = "10")]
        questions: usize,

        /// Target success rate (0.3-0.95)
        #[arg(long, default_value = "0.7")]
        target: f64,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Calibrate IRT parameters for a question
    Calibrate {
        #[arg(long)]
        question: String,

        /// JSON file of responses; defaults to the dataset's attempts on the question
        #[arg(long)]
        responses: Option<PathBuf>,
    },

    /// Predict dropout risk
    Risk {
        /// Student whose stored features to use
        #[arg(long, conflicts_with = "features", required_unless_present = "features")]
        student: Option<String>,

        /// JSON file of risk features
        #[arg(long)]
        features: Option<PathBuf>,
    },

    /// Train the risk model from the dataset's labelled samples
    Train {
        /// Retrain even if a model artifact exists
        #[arg(long)]
        force: bool,

        /// Top up with synthetic samples when real data is scarce
        #[arg(long)]
        allow_synthetic: bool,
    },

    /// Dashboard summary for a student
    Summary {
        #[arg(long)]
        student: String,

        /// Output format: json, html
        #[arg(long, default_value = "json")]
        format: String,

        /// Output directory (defaults to the configured one)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Aggregated insights for a teacher's class
    Class {
        #[arg(long)]
        teacher: String,

        #[arg(long)]
        class: String,

        /// Output format: json, html
        #[arg(long, default_value = "json")]
        format: String,

        /// Output directory (defaults to the configured one)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Generate a mock dataset
    MockData {
        #[arg(long, default_value = "30")]
        students: usize,

        #[arg(long, default_value = "20")]
        quizzes: usize,

        /// RNG seed for reproducible data
        #[arg(long)]
        seed: Option<u64>,

        /// Output path (defaults to the configured data path)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate a topic graph TOML file
    Validate {
        #[arg(long)]
        graph: PathBuf,
    },

    /// Create starter config and topic graph
    Init,
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "skillscope=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Competency {
            student,
            topic,
            format,
        } => commands::student::competency(config, student, topic, format).await,
        Commands::Recommend {
            student,
            count,
            format,
        } => commands::student::recommend(config, student, count, format).await,
        Commands::Quiz {
            student,
            topic,
            questions,
            target,
            format,
        } => commands::student::quiz(config, student, topic, questions, target, format).await,
        Commands::Calibrate {
            question,
            responses,
        } => commands::calibrate::execute(config, question, responses).await,
        Commands::Risk { student, features } => {
            commands::risk::predict(config, student, features).await
        }
        Commands::Train {
            force,
            allow_synthetic,
        } => commands::risk::train(config, force, allow_synthetic).await,
        Commands::Summary {
            student,
            format,
            output,
        } => commands::report::summary(config, student, format, output).await,
        Commands::Class {
            teacher,
            class,
            format,
            output,
        } => commands::report::class(config, teacher, class, format, output).await,
        Commands::MockData {
            students,
            quizzes,
            seed,
            output,
        } => commands::mock_data::execute(config, students, quizzes, seed, output),
        Commands::Validate { graph } => commands::validate::execute(graph),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use sql_anonymizer::config::Config;
use sql_anonymizer::parser::{collect_sql_files, read_sql_file, read_sql_stdin};
use sql_anonymizer::{
    anonymize_files, migrate_schema, Anonymizer, Backend, MigrationOptions, SanitizeOptions,
    SqlDialect,
};

#[derive(Parser)]
#[command(name = "sql-anonymizer")]
#[command(author, version, about = "Anonymize SQL queries and database schemas")]
struct Cli {
    /// Configuration file (defaults to ./sql-anonymizer.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log progress information
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Anonymize a SQL query file (or stdin)
    Query {
        /// Input SQL file (reads stdin when omitted)
        input: Option<PathBuf>,

        /// Output file (writes stdout when omitted)
        output: Option<PathBuf>,

        /// Print the transformation mapping after the SQL
        #[arg(long)]
        explain: bool,

        /// SQL dialect of the input (postgres, mysql, sqlite, tsql, ...)
        #[arg(long)]
        dialect: Option<String>,

        /// Report ambiguous columns as strict-mode violations
        #[arg(long)]
        strict_mode: bool,

        /// Also write the transformation mapping as JSON to this file
        #[arg(long)]
        log_file: Option<PathBuf>,

        /// Anonymize every .sql file in these directories or glob patterns
        #[arg(long, num_args = 1.., conflicts_with_all = ["input", "output"], requires = "out_dir")]
        batch: Vec<String>,

        /// Output directory for --batch
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Anonymize a whole database schema (and SQLite data)
    Schema {
        /// Database type: sqlite, postgres or mysql
        #[arg(long)]
        dbtype: Option<Backend>,

        /// Input SQLite database file
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output SQLite file, or output directory for the DDL script
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Save the transformation mapping as JSON
        #[arg(short, long = "log")]
        log: Option<PathBuf>,

        /// Database host
        #[arg(long)]
        host: Option<String>,

        /// Database name
        #[arg(short, long)]
        database: Option<String>,

        /// Database user
        #[arg(short, long)]
        user: Option<String>,

        /// Database password
        #[arg(short, long, env = "SQL_ANONYMIZER_DB_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Database port
        #[arg(long)]
        port: Option<u16>,

        /// PostgreSQL schema to read (default: public)
        #[arg(long)]
        pg_schema: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = Config::discover(cli.config.as_deref())?;

    match cli.command {
        Commands::Query {
            input,
            output,
            explain,
            dialect,
            strict_mode,
            log_file,
            batch,
            out_dir,
        } => {
            let dialect = dialect
                .or(config.query.dialect.clone())
                .map(|name| SqlDialect::resolve(&name))
                .unwrap_or_default();
            let options = SanitizeOptions {
                dialect,
                strict_mode: strict_mode || config.query.strict_mode.unwrap_or(false),
                explain: explain || config.query.explain.unwrap_or(false),
            };

            if !batch.is_empty() {
                let out_dir = out_dir.context("--out-dir is required with --batch")?;
                return run_batch(&batch, &out_dir, &options);
            }

            run_query(input, output, log_file, &options)?;
        }
        Commands::Schema {
            dbtype,
            input,
            output,
            log,
            host,
            database,
            user,
            password,
            port,
            pg_schema,
        } => {
            let backend = match dbtype {
                Some(backend) => backend,
                None => match &config.schema.dbtype {
                    Some(name) => name.parse().map_err(anyhow::Error::msg)?,
                    None => bail!("--dbtype is required (sqlite, postgres or mysql)"),
                },
            };
            let schema = config.schema;
            let options = MigrationOptions {
                backend,
                input,
                output,
                log_path: log,
                host: host.or(schema.host),
                database: database.or(schema.database),
                user: user.or(schema.user),
                password,
                port: port.or(schema.port),
                pg_schema: pg_schema.or(schema.pg_schema),
            };
            options.validate()?;

            let runtime = tokio::runtime::Runtime::new()?;
            let outcome = runtime.block_on(migrate_schema(&options));
            let log = outcome.result?;

            println!("\n--- Transformation Mapping ---");
            print!("{}", log.summary());
            println!("----------------------------");
        }
    }

    Ok(())
}

fn run_query(
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    log_file: Option<PathBuf>,
    options: &SanitizeOptions,
) -> Result<()> {
    let sql = match &input {
        Some(path) => read_sql_file(path)?,
        None => read_sql_stdin()?,
    };

    let mut anonymizer = Anonymizer::new(options.strict_mode);
    let outcome = anonymizer.sanitize(&sql, options.dialect, options.explain || log_file.is_some());

    let mapping = outcome.log.to_explain_json()?;
    let mut rendered = outcome.sql.clone();
    if options.explain {
        rendered.push_str("\n\n--- Transformation Mapping ---\n");
        rendered.push_str(&mapping);
    }
    rendered.push('\n');

    match &output {
        Some(path) => {
            fs::write(path, &rendered)
                .with_context(|| format!("Failed to write output: {}", path.display()))?;
            eprintln!("Anonymized SQL written to {}", path.display());
        }
        None => {
            std::io::stdout().write_all(rendered.as_bytes())?;
        }
    }

    if let Some(path) = &log_file {
        fs::write(path, &mapping)
            .with_context(|| format!("Failed to write mapping log: {}", path.display()))?;
    }

    if outcome.is_failure() {
        eprintln!("Input could not be parsed; it was emitted unchanged");
    }
    Ok(())
}

fn run_batch(patterns: &[String], out_dir: &Path, options: &SanitizeOptions) -> Result<()> {
    let files = collect_sql_files(patterns);
    if files.is_empty() {
        bail!("No .sql files found in {}", patterns.join(", "));
    }

    let reports = anonymize_files(&files, out_dir, options)?;
    let failed = reports.iter().filter(|r| r.failed).count();
    for report in &reports {
        let status = if report.failed { "unparsed" } else { "ok" };
        println!(
            "{} -> {} ({}, {} diagnostic(s))",
            report.input.display(),
            report.output.display(),
            status,
            report.diagnostics.len()
        );
    }
    println!(
        "Anonymized {} of {} file(s) into {}",
        reports.len() - failed,
        reports.len(),
        out_dir.display()
    );

    if failed > 0 {
        bail!("{} file(s) could not be parsed", failed);
    }
    Ok(())
}

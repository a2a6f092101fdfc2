//! Datahub CLI - query and edit CSV, XML, JSON and YAML files
//!
//! # Commands
//!
//! ```bash
//! datahub detect contacts.dat                          # Show the detected format
//! datahub headers people.csv                           # List table headers
//! datahub query people.csv -f "City EQUALS Linz"      # Filter rows
//! datahub get contacts.xml --tag phone --scope /Contacts/Business
//! datahub set contacts.xml --tag phone --value 0 --scope /Contacts/Business --all
//! datahub convert people.csv --to json                 # Re-encode a file
//! ```
//!
//! Delimiter, orientation, header row and encoding come from (lowest to
//! highest priority) the defaults, `--config`, `DATAHUB_*` variables (a `.env`
//! file is loaded) and the command line flags.

use clap::{Args, Parser, Subcommand};
use datahub::{
    parse_delimiter, Container, ContainerOptions, Filter, Format, Orientation, Scope, TabularAdapter,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "datahub")]
#[command(about = "Uniform read, query and mutate verbs over CSV, XML, JSON and YAML", long_about = None)]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Force the input format (csv, xml, json, yaml)
    #[arg(long, global = true, value_parser = parse_format)]
    format: Option<Format>,

    /// Field delimiter for delimited input (e.g. ';', ',', tab, pipe)
    #[arg(short, long, global = true)]
    delimiter: Option<String>,

    /// Header orientation for delimited input (column, row)
    #[arg(long, global = true)]
    orientation: Option<Orientation>,

    /// Index of the header record
    #[arg(long, global = true)]
    header_row: Option<usize>,

    /// Source encoding (auto-detect if not specified)
    #[arg(long, global = true)]
    encoding: Option<String>,

    /// JSON file with container options
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the format of a file
    Detect {
        /// Input file
        input: PathBuf,
    },

    /// List the headers of a delimited file
    Headers {
        /// Input file
        input: PathBuf,
    },

    /// Filter the rows of a delimited file
    Query {
        /// Input file
        input: PathBuf,

        /// Filter rule, `<header> <OPERATOR> <v1>|<v2>` (repeatable, AND-ed)
        #[arg(short, long = "filter")]
        filters: Vec<String>,

        /// Comma-separated columns to output (default: all)
        #[arg(short, long)]
        columns: Option<String>,

        /// Output JSON records instead of delimited text
        #[arg(long)]
        json: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Read elements from an XML, JSON or YAML file
    Get {
        /// Input file
        input: PathBuf,

        /// Element tag or object key
        #[arg(short, long)]
        tag: String,

        /// Scope path (XPath subset for XML, `/a/0/b` for JSON/YAML)
        #[arg(short, long)]
        scope: Option<String>,

        /// Filter rule on `@attr`, the tag or a child tag (repeatable)
        #[arg(short, long = "filter")]
        filters: Vec<String>,

        /// Output matched elements as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rewrite values in place
    Set {
        /// Input file
        input: PathBuf,

        /// Element tag (trees) or header (tables)
        #[arg(short, long)]
        tag: String,

        /// New value
        #[arg(short, long)]
        value: String,

        /// Scope path, required for trees
        #[arg(short, long)]
        scope: Option<String>,

        /// Filter rule (repeatable)
        #[arg(short, long = "filter")]
        filters: Vec<String>,

        /// Update every match instead of the first (trees)
        #[arg(long)]
        all: bool,

        /// Write to this file instead of the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert a file to another format
    Convert {
        /// Input file
        input: PathBuf,

        /// Target format (csv, xml, json, yaml)
        #[arg(long, value_parser = parse_format)]
        to: Format,

        /// Record element/key when the input is a tree
        #[arg(short, long)]
        record: Option<String>,

        /// Scope of the record elements
        #[arg(short, long)]
        scope: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = build_options(&cli.source).and_then(|options| {
        let format = cli.source.format;
        match cli.command {
            Commands::Detect { input } => cmd_detect(&input, format, options),

            Commands::Headers { input } => cmd_headers(&input, format, options),

            Commands::Query {
                input,
                filters,
                columns,
                json,
                output,
            } => cmd_query(&input, format, options, &filters, columns.as_deref(), json, output.as_deref()),

            Commands::Get {
                input,
                tag,
                scope,
                filters,
                json,
            } => cmd_get(&input, format, options, &tag, scope.as_deref(), &filters, json),

            Commands::Set {
                input,
                tag,
                value,
                scope,
                filters,
                all,
                output,
            } => cmd_set(
                &input,
                format,
                options,
                &tag,
                &value,
                scope.as_deref(),
                &filters,
                all,
                output.as_deref(),
            ),

            Commands::Convert {
                input,
                to,
                record,
                scope,
                output,
            } => cmd_convert(&input, format, options, to, record.as_deref(), scope.as_deref(), output.as_deref()),
        }
    });

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn parse_format(raw: &str) -> Result<Format, String> {
    raw.parse::<Format>().map_err(|e| e.to_string())
}

/// Defaults < config file < environment < flags
fn build_options(args: &SourceArgs) -> Result<ContainerOptions, Box<dyn std::error::Error>> {
    let mut options = match &args.config {
        Some(path) => ContainerOptions::from_json_file(path)?,
        None => ContainerOptions::default(),
    }
    .with_env();

    if let Some(raw) = &args.delimiter {
        options.delimiter = parse_delimiter(raw).ok_or_else(|| format!("invalid delimiter '{}'", raw))?;
    }
    if let Some(orientation) = args.orientation {
        options.orientation = orientation;
    }
    if let Some(header_row) = args.header_row {
        options.header_row = header_row;
    }
    if let Some(encoding) = &args.encoding {
        options.encoding = Some(encoding.clone());
    }
    Ok(options)
}

fn open(input: &Path, format: Option<Format>, options: ContainerOptions) -> Result<Container, Box<dyn std::error::Error>> {
    eprintln!("📄 Reading: {}", input.display());
    let container = Container::open_with(input, format, options)?;
    print_diagnostics(&container);
    Ok(container)
}

fn print_diagnostics(container: &Container) {
    for entry in container.take_diagnostics() {
        eprintln!("{}", entry);
    }
}

fn parse_filter(rules: &[String]) -> Result<Filter, Box<dyn std::error::Error>> {
    Ok(Filter::parse_rules(rules)?)
}

fn cmd_detect(input: &Path, format: Option<Format>, options: ContainerOptions) -> CliResult {
    let container = open(input, format, options)?;
    println!("{}", container.format());
    Ok(())
}

fn cmd_headers(input: &Path, format: Option<Format>, options: ContainerOptions) -> CliResult {
    let container = open(input, format, options)?;
    for header in container.headers()? {
        println!("{}", header);
    }
    Ok(())
}

fn cmd_query(
    input: &Path,
    format: Option<Format>,
    options: ContainerOptions,
    filters: &[String],
    columns: Option<&str>,
    json: bool,
    output: Option<&Path>,
) -> CliResult {
    let container = open(input, format, options)?;
    let filter = parse_filter(filters)?;
    if !filter.is_empty() {
        eprintln!("   Filter: {}", filter.to_query_string());
    }

    let columns: Option<Vec<&str>> = columns.map(|c| c.split(',').map(str::trim).collect());
    let rows = container.get_rows_list(columns.as_deref(), &filter)?;
    print_diagnostics(&container);
    eprintln!("✅ {} matching rows", rows.len());

    let headers: Vec<String> = match &columns {
        Some(names) => names
            .iter()
            .filter(|n| container.headers().map_or(false, |h| h.iter().any(|x| x == *n)))
            .map(|n| n.to_string())
            .collect(),
        None => container.headers()?.to_vec(),
    };
    let mut table = TabularAdapter::new(container.options().clone());
    table.set_headers(&headers, true);
    for row in rows {
        table.add_row(row);
    }

    let content = if json {
        serde_json::to_string_pretty(&table.to_records(&Filter::new())?)?
    } else {
        table.write_string()?
    };
    write_output(&content, output)
}

fn cmd_get(
    input: &Path,
    format: Option<Format>,
    options: ContainerOptions,
    tag: &str,
    scope: Option<&str>,
    filters: &[String],
    json: bool,
) -> CliResult {
    let container = open(input, format, options)?;
    let filter = parse_filter(filters)?;
    let elements = container.get(tag, &Scope::from(scope), &filter)?;
    print_diagnostics(&container);
    eprintln!("✅ {} matching elements", elements.len());

    if json {
        println!("{}", serde_json::to_string_pretty(&elements)?);
    } else {
        for element in elements {
            println!("{}", element.text);
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_set(
    input: &Path,
    format: Option<Format>,
    options: ContainerOptions,
    tag: &str,
    value: &str,
    scope: Option<&str>,
    filters: &[String],
    all: bool,
    output: Option<&Path>,
) -> CliResult {
    let mut container = open(input, format, options)?;
    let filter = parse_filter(filters)?;

    let changed = if container.format().is_tree() {
        container.set(tag, value, &Scope::from(scope), &filter, all)?
    } else {
        container.set_values(tag, value, &filter)?
    };
    print_diagnostics(&container);
    eprintln!("✅ {} values updated", changed);

    match output {
        Some(path) => container.write_file(path)?,
        None => container.write_data()?,
    }
    eprintln!("💾 Written to: {}", output.unwrap_or(input).display());
    Ok(())
}

fn cmd_convert(
    input: &Path,
    format: Option<Format>,
    options: ContainerOptions,
    to: Format,
    record: Option<&str>,
    scope: Option<&str>,
    output: Option<&Path>,
) -> CliResult {
    let container = open(input, format, options.clone())?;
    let table = container.to_table(record, &Scope::from(scope))?;
    print_diagnostics(&container);
    eprintln!("⚙️  {} -> {}: {} records", container.format(), to, table.len());

    let converted = Container::from_table(&table, to, options)?;
    write_output(&converted.write_string()?, output)
}

fn write_output(content: &str, path: Option<&Path>) -> CliResult {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

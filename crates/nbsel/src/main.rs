//! nbsel - select, filter and edit Jupyter notebook cells
//!
//! Selectors are built in stages and passed between invocations through a
//! pipe; every other command reads the piped selector and applies itself to
//! the matching cells.
//!
//! Usage:
//!   nbsel select is_code | nbsel select contains TODO | nbsel delete nb.ipynb
//!   nbsel select is_markdown --invert | nbsel count nb.ipynb
//!   nbsel show nb.ipynb                 Show every cell
//!   nbsel auto_slide nb.ipynb -o talk.ipynb
//!   nbsel convert slides talk.ipynb

use anyhow::{bail, Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::{Color, Colorize};
use nbsel_core::{
    default_output_path, registry, BoxStyle, ContainsQuery, DisplayOptions, ExportFormat,
    ExportOptions, NbconvertExporter, Notebook, RenderOptions, Replacement, Selector,
    SelectorArgs,
};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

mod config;

use config::{default_config_path, load_config, Config};

#[derive(Parser)]
#[command(name = "nbsel")]
#[command(about = "Select, filter and edit Jupyter notebook cells")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where a mutating command writes the notebook
#[derive(Args, Clone)]
struct OutputArgs {
    /// Output notebook (defaults to overwriting the input)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the selected cells in human readable format
    Show {
        notebook_path: PathBuf,

        /// Box style: single, double, heavy, ascii or none
        #[arg(short, long)]
        style: Option<BoxStyle>,

        /// Maximum width of a cell box
        #[arg(short, long)]
        width: Option<usize>,

        /// Colour of the cells (e.g. cyan, "bright blue")
        #[arg(short, long)]
        color: Option<String>,

        /// MIME types to leave out of the outputs. Can be specified multiple times.
        #[arg(long = "exclude-output-type", value_name = "MIME")]
        exclude: Vec<String>,
    },
    /// Count the selected cells
    Count { notebook_path: PathBuf },
    /// Print the index of the first selected cell
    First { notebook_path: PathBuf },
    /// Print the index of the last selected cell
    Last { notebook_path: PathBuf },
    /// Print the indices of the selected cells
    List { notebook_path: PathBuf },
    /// Search text in the selected cells and print the matching indices
    Search {
        notebook_path: PathBuf,

        /// Text to search for
        #[arg(short, long)]
        text: String,

        /// Case-sensitive search
        #[arg(long, overrides_with = "no_case")]
        case: bool,

        /// Case-insensitive search (default)
        #[arg(long = "no-case", overrides_with = "case")]
        no_case: bool,

        /// Interpret the text as a regular expression
        #[arg(short, long)]
        regex: bool,

        /// Also search the cell outputs
        #[arg(short, long)]
        output: bool,
    },
    /// Erase the content of the selected cells
    Erase {
        notebook_path: PathBuf,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Delete the selected cells
    Delete {
        notebook_path: PathBuf,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Delete all the non-selected cells
    Keep {
        notebook_path: PathBuf,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Replace text in the selected cells
    Replace {
        notebook_path: PathBuf,
        #[command(flatten)]
        out: OutputArgs,

        /// Text to replace
        #[arg(long)]
        old: String,

        /// Replacement text
        #[arg(long)]
        new: String,

        /// Maximum number of replacements per cell
        #[arg(long)]
        count: Option<usize>,

        /// Interpret --old as a regular expression; --new may use $1 groups
        #[arg(long)]
        regex: bool,

        /// Case-sensitive matching (default)
        #[arg(long, overrides_with = "no_case")]
        case: bool,

        /// Case-insensitive matching
        #[arg(long = "no-case", overrides_with = "case")]
        no_case: bool,
    },
    /// Split the selected cells into slides
    #[command(name = "auto_slide", alias = "auto-slide")]
    AutoSlide {
        notebook_path: PathBuf,
        #[command(flatten)]
        out: OutputArgs,

        /// Maximum number of cells per slide [default: 3]
        #[arg(long)]
        max_cells: Option<usize>,

        /// Maximum number of cells with images per slide [default: 1]
        #[arg(long)]
        max_images: Option<usize>,

        /// Delete empty cells first (default)
        #[arg(long, overrides_with = "keep_empty")]
        delete_empty: bool,

        /// Keep empty cells
        #[arg(long, overrides_with = "delete_empty")]
        keep_empty: bool,
    },
    /// Erase outputs of the selected cells
    #[command(name = "erase_output", alias = "erase-output")]
    EraseOutput {
        notebook_path: PathBuf,
        #[command(flatten)]
        out: OutputArgs,

        /// MIME type to erase, such as "image/png". Stream and error outputs
        /// are also erased by their category "text". Can be specified
        /// multiple times; without it every output is erased.
        #[arg(long = "output-type", value_name = "MIME")]
        output_types: Vec<String>,
    },
    /// Merge a JSON value into the metadata of the selected cells
    Tag {
        notebook_path: PathBuf,
        #[command(flatten)]
        out: OutputArgs,

        /// Metadata key
        #[arg(short, long)]
        key: String,

        /// JSON value (mappings are merged into an existing mapping)
        #[arg(short, long)]
        value: String,
    },
    /// Convert the selected cells with jupyter nbconvert
    Convert {
        #[command(subcommand)]
        format: ConvertCommand,
    },
    /// Build a selector and write it to stdout for the next command
    #[command(allow_negative_numbers = true)]
    Select {
        /// Selector name, index (e.g. 3, -1) or slice (e.g. 1:4, ::2)
        #[arg(required_unless_present = "list")]
        selector: Option<String>,

        /// Positional arguments of the selector. `contains` ignores case
        /// unless given `--kwarg case true`.
        arguments: Vec<String>,

        /// Keyword argument of the selector. Can be specified multiple times.
        #[arg(long = "kwarg", num_args = 2, value_names = ["KEY", "VALUE"])]
        kwargs: Vec<String>,

        /// Combine with the piped selector using OR instead of AND
        #[arg(long = "or")]
        or: bool,

        /// Negate this selector before combining it
        #[arg(short, long)]
        invert: bool,

        /// List the available selectors
        #[arg(long)]
        list: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ConvertCommand {
    /// Convert to HTML
    Html {
        #[command(flatten)]
        common: ConvertArgs,
        #[command(flatten)]
        exclude: ExcludeArgs,
    },
    /// Convert to Markdown
    Md {
        #[command(flatten)]
        common: ConvertArgs,
        #[command(flatten)]
        exclude: ExcludeArgs,
    },
    /// Convert to a Python script
    Py {
        #[command(flatten)]
        common: ConvertArgs,
    },
    /// Convert to reveal.js slides
    Slides {
        #[command(flatten)]
        common: ConvertArgs,
        #[command(flatten)]
        exclude: ExcludeArgs,

        /// reveal.js theme
        #[arg(long, default_value = "simple")]
        theme: String,

        /// reveal.js transition
        #[arg(long, default_value = "slide")]
        transition: String,

        /// Enable scrolling inside a slide (default)
        #[arg(long, overrides_with = "no_scroll")]
        scroll: bool,

        /// Disable scrolling inside a slide
        #[arg(long = "no-scroll", overrides_with = "scroll")]
        no_scroll: bool,
    },
}

#[derive(Args, Clone)]
struct ConvertArgs {
    notebook_path: PathBuf,

    /// Output file (defaults to the notebook name with the format's extension)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// nbconvert template
    #[arg(short, long)]
    template_name: Option<String>,

    /// Exporter option, passed as --<Exporter>.KEY=VALUE. Can be specified multiple times.
    #[arg(long = "kwarg", num_args = 2, value_names = ["KEY", "VALUE"])]
    kwargs: Vec<String>,
}

#[derive(Args, Clone, Default)]
struct ExcludeArgs {
    #[arg(long)]
    exclude_code_cell: bool,
    #[arg(long)]
    exclude_markdown: bool,
    #[arg(long)]
    exclude_raw: bool,
    #[arg(long)]
    exclude_unknown: bool,
    #[arg(long)]
    exclude_input: bool,
    #[arg(long)]
    exclude_output: bool,
}

/// Resolve a `--flag/--no-flag` pair
fn flag_pair(yes: bool, no: bool, default: bool) -> bool {
    if yes {
        true
    } else if no {
        false
    } else {
        default
    }
}

/// Group `--kwarg KEY VALUE` values into pairs
fn kwarg_pairs(values: Vec<String>) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(values.len() / 2);
    let mut iter = values.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        pairs.push((key, value));
    }
    pairs
}

/// Selector piped in by a previous `nbsel select`, or every cell
fn piped_selector() -> Result<Option<Selector>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut bytes = Vec::new();
    io::stdin()
        .lock()
        .read_to_end(&mut bytes)
        .context("Failed to read selector from stdin")?;
    if bytes.is_empty() {
        return Ok(None);
    }
    let selector = Selector::from_bytes(&bytes).context("Failed to decode piped selector")?;
    tracing::debug!("Read piped selector: {selector:?}");
    Ok(Some(selector))
}

fn read_notebook(path: &Path) -> Result<(Notebook, Selector)> {
    let notebook = Notebook::read_ipynb(path)
        .with_context(|| format!("Failed to read notebook: {}", path.display()))?;
    let selector = piped_selector()?.unwrap_or_default();
    Ok((notebook, selector))
}

fn write_notebook(notebook: &Notebook, input: &Path, out: &OutputArgs) -> Result<()> {
    let path = out.output.as_deref().unwrap_or(input);
    notebook
        .write_ipynb(path)
        .with_context(|| format!("Failed to write notebook: {}", path.display()))
}

fn print_index(index: Option<usize>) {
    match index {
        Some(index) => println!("{index}"),
        None => println!("None"),
    }
}

fn cmd_show(
    path: &Path,
    config: &Config,
    style: Option<BoxStyle>,
    width: Option<usize>,
    color: Option<String>,
    exclude: Vec<String>,
) -> Result<()> {
    let (notebook, selector) = read_notebook(path)?;
    let display = DisplayOptions {
        style: match style {
            Some(style) => style,
            None => config.show_style()?.unwrap_or_default(),
        },
        width: width.or(config.show_width()),
        render: RenderOptions {
            enabled: None,
            excluded: exclude.into_iter().collect(),
        },
        ..Default::default()
    };
    let color = match color.as_deref().or(config.show_color()) {
        Some(name) => Some(
            name.parse::<Color>()
                .map_err(|()| anyhow::anyhow!("Unknown color '{name}'"))?,
        ),
        None => None,
    };

    let rendered = notebook.to_str(&selector, &display);
    match color {
        Some(color) => println!("{}", rendered.color(color)),
        None => println!("{rendered}"),
    }
    Ok(())
}

/// `select contains` matches case-insensitively unless `case` is given,
/// the same default as `search`
fn default_case_insensitive(token: &str, args: &mut SelectorArgs) {
    if token == "contains" && args.positional.len() < 2 && !args.keyword.contains_key("case") {
        args.keyword.insert("case".to_string(), "false".to_string());
    }
}

fn cmd_select(
    token: &str,
    arguments: Vec<String>,
    kwargs: Vec<String>,
    or: bool,
    invert: bool,
) -> Result<()> {
    let keyword: BTreeMap<String, String> = kwarg_pairs(kwargs).into_iter().collect();
    let mut args = SelectorArgs::new(arguments, keyword);
    default_case_insensitive(token, &mut args);
    let mut selector = Selector::parse(token, &args)
        .with_context(|| format!("Failed to build selector '{token}'"))?;
    if invert {
        selector = !selector;
    }
    if let Some(piped) = piped_selector()? {
        selector = if or { piped | selector } else { piped & selector };
    }

    let bytes = selector.to_bytes()?;
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(&bytes)
        .and_then(|()| stdout.flush())
        .context("Failed to write selector to stdout")?;
    Ok(())
}

fn cmd_select_list() {
    for entry in registry().entries() {
        println!(
            "{:<18} {:<30} {}",
            entry.name.bold(),
            entry.usage,
            entry.help
        );
    }
}

fn cmd_convert(command: ConvertCommand, config: &Config) -> Result<()> {
    let (format, common, exclude, slides) = match command {
        ConvertCommand::Html { common, exclude } => (ExportFormat::Html, common, exclude, None),
        ConvertCommand::Md { common, exclude } => (ExportFormat::Markdown, common, exclude, None),
        ConvertCommand::Py { common } => (ExportFormat::Python, common, ExcludeArgs::default(), None),
        ConvertCommand::Slides {
            common,
            exclude,
            theme,
            transition,
            scroll,
            no_scroll,
        } => (
            ExportFormat::Slides,
            common,
            exclude,
            Some((theme, transition, flag_pair(scroll, no_scroll, true))),
        ),
    };

    let (notebook, selector) = read_notebook(&common.notebook_path)?;
    let output = common
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&common.notebook_path, format));
    let (theme, transition, scroll) = match slides {
        Some((theme, transition, scroll)) => (Some(theme), Some(transition), Some(scroll)),
        None => (None, None, None),
    };
    let options = ExportOptions {
        template_name: common.template_name,
        exclude_code_cell: exclude.exclude_code_cell,
        exclude_markdown: exclude.exclude_markdown,
        exclude_raw: exclude.exclude_raw,
        exclude_unknown: exclude.exclude_unknown,
        exclude_input: exclude.exclude_input,
        exclude_output: exclude.exclude_output,
        theme,
        transition,
        scroll,
        kwargs: kwarg_pairs(common.kwargs),
    };

    let exporter = NbconvertExporter::new(config.jupyter_program());
    let written = exporter
        .export(&notebook, &selector, format, &output, &options)
        .with_context(|| format!("Failed to convert {} to {format}", common.notebook_path.display()))?;
    tracing::info!("Wrote {}", written.display());
    Ok(())
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries selectors and results
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&default_config_path()?)?;

    match cli.command {
        Commands::Show {
            notebook_path,
            style,
            width,
            color,
            exclude,
        } => cmd_show(&notebook_path, &config, style, width, color, exclude),
        Commands::Count { notebook_path } => {
            let (notebook, selector) = read_notebook(&notebook_path)?;
            println!("{}", notebook.count(&selector));
            Ok(())
        }
        Commands::First { notebook_path } => {
            let (notebook, selector) = read_notebook(&notebook_path)?;
            print_index(notebook.first(&selector));
            Ok(())
        }
        Commands::Last { notebook_path } => {
            let (notebook, selector) = read_notebook(&notebook_path)?;
            print_index(notebook.last(&selector));
            Ok(())
        }
        Commands::List { notebook_path } => {
            let (notebook, selector) = read_notebook(&notebook_path)?;
            println!("{:?}", notebook.list(&selector));
            Ok(())
        }
        Commands::Search {
            notebook_path,
            text,
            case,
            no_case,
            regex,
            output,
        } => {
            let (notebook, selector) = read_notebook(&notebook_path)?;
            let query = ContainsQuery::new(text)
                .case(flag_pair(case, no_case, false))
                .regex(regex)
                .output(output);
            println!("{:?}", notebook.search_all(&selector, &query)?);
            Ok(())
        }
        Commands::Erase { notebook_path, out } => {
            let (mut notebook, selector) = read_notebook(&notebook_path)?;
            notebook.erase(&selector);
            write_notebook(&notebook, &notebook_path, &out)
        }
        Commands::Delete { notebook_path, out } => {
            let (mut notebook, selector) = read_notebook(&notebook_path)?;
            notebook.delete(&selector);
            write_notebook(&notebook, &notebook_path, &out)
        }
        Commands::Keep { notebook_path, out } => {
            let (mut notebook, selector) = read_notebook(&notebook_path)?;
            notebook.keep(&selector);
            write_notebook(&notebook, &notebook_path, &out)
        }
        Commands::Replace {
            notebook_path,
            out,
            old,
            new,
            count,
            regex,
            case,
            no_case,
        } => {
            let (mut notebook, selector) = read_notebook(&notebook_path)?;
            let replacement = Replacement::new(old, new)
                .count(count)
                .case(flag_pair(case, no_case, true))
                .regex(regex);
            notebook.replace(&selector, &replacement)?;
            write_notebook(&notebook, &notebook_path, &out)
        }
        Commands::AutoSlide {
            notebook_path,
            out,
            max_cells,
            max_images,
            delete_empty,
            keep_empty,
        } => {
            let (mut notebook, selector) = read_notebook(&notebook_path)?;
            let mut options = config.auto_slide();
            if max_cells.is_some() {
                options.max_cells = max_cells;
            }
            if max_images.is_some() {
                options.max_images = max_images;
            }
            options.delete_empty = flag_pair(delete_empty, keep_empty, options.delete_empty);
            notebook.auto_slide(&selector, &options);
            write_notebook(&notebook, &notebook_path, &out)
        }
        Commands::EraseOutput {
            notebook_path,
            out,
            output_types,
        } => {
            let (mut notebook, selector) = read_notebook(&notebook_path)?;
            let types: BTreeSet<String> = output_types.into_iter().collect();
            notebook.erase_output(&selector, (!types.is_empty()).then_some(&types));
            write_notebook(&notebook, &notebook_path, &out)
        }
        Commands::Tag {
            notebook_path,
            out,
            key,
            value,
        } => {
            let value: serde_json::Value = serde_json::from_str(&value)
                .with_context(|| format!("--value is not valid JSON: {value}"))?;
            let (mut notebook, selector) = read_notebook(&notebook_path)?;
            notebook.tag(&selector, &key, &value);
            write_notebook(&notebook, &notebook_path, &out)
        }
        Commands::Convert { format } => cmd_convert(format, &config),
        Commands::Select {
            selector,
            arguments,
            kwargs,
            or,
            invert,
            list,
        } => {
            if list {
                cmd_select_list();
                return Ok(());
            }
            let Some(token) = selector else {
                bail!("a selector name, index or slice is required");
            };
            cmd_select(&token, arguments, kwargs, or, invert)
        }
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "nbsel", &mut io::stdout());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flag_pair() {
        assert!(flag_pair(false, false, true));
        assert!(!flag_pair(false, true, true));
        assert!(flag_pair(true, false, false));
    }

    #[test]
    fn test_kwarg_pairs() {
        let pairs = kwarg_pairs(vec!["case".into(), "false".into(), "regex".into(), "true".into()]);
        assert_eq!(
            pairs,
            vec![
                ("case".to_string(), "false".to_string()),
                ("regex".to_string(), "true".to_string())
            ]
        );
    }

    #[test]
    fn test_select_parses_negative_index() {
        let cli = Cli::try_parse_from(["nbsel", "select", "-1"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Select { selector: Some(ref s), .. } if s == "-1"
        ));
    }

    #[test]
    fn test_contains_defaults_to_ignoring_case() {
        let mut args = SelectorArgs::new(vec!["x".into()], BTreeMap::new());
        default_case_insensitive("contains", &mut args);
        assert_eq!(args.keyword.get("case").map(String::as_str), Some("false"));

        let explicit = BTreeMap::from([("case".to_string(), "true".to_string())]);
        let mut args = SelectorArgs::new(vec!["x".into()], explicit);
        default_case_insensitive("contains", &mut args);
        assert_eq!(args.keyword.get("case").map(String::as_str), Some("true"));

        let mut args = SelectorArgs::new(vec!["x".into(), "true".into()], BTreeMap::new());
        default_case_insensitive("contains", &mut args);
        assert!(args.keyword.is_empty());

        let mut args = SelectorArgs::new(vec!["x".into()], BTreeMap::new());
        default_case_insensitive("has_tag", &mut args);
        assert!(args.keyword.is_empty());
    }
}

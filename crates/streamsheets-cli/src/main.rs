//! Streamsheets CLI - parse, evaluate and inspect formulas

mod functions;
mod sheet;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use streamsheets_parser::{
    Cell, ContextSettings, DefaultParserContext, Parser as FormulaParser, ParserContext,
    ParserError, TokenInfo,
};

use functions::demo_functions;
use sheet::{Sheet, SheetContext};

#[derive(Parser)]
#[command(name = "ssheet")]
#[command(author, version, about = "Streamsheets formula parser and evaluator")]
struct Cli {
    /// Print diagnostics on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a formula and print it normalized
    Parse {
        formula: String,

        /// Locale deciding the decimal and parameter separators (en, de, fr, ...)
        #[arg(short, long, default_value = "en")]
        locale: String,

        /// Reject unknown identifiers and missing operands
        #[arg(short, long)]
        strict: bool,

        /// Keep going after syntax errors, marking broken parts invalid
        #[arg(short, long)]
        tolerant: bool,

        /// Print the syntax tree as JSON instead
        #[arg(short, long)]
        json: bool,
    },

    /// Evaluate a formula against a set of cells
    Eval {
        formula: String,

        /// Locale deciding the decimal and parameter separators
        #[arg(short, long, default_value = "en")]
        locale: String,

        /// Cell definition, e.g. `A1=2` or `B1==A1*2` (repeatable)
        #[arg(short, long = "cell", value_name = "NAME=FORMULA")]
        cells: Vec<String>,
    },

    /// List the tokens of a formula with their positions
    Tokens {
        formula: String,

        /// Locale deciding the decimal and parameter separators
        #[arg(short, long, default_value = "en")]
        locale: String,

        /// Print the tokens as JSON
        #[arg(short, long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    match cli.command {
        Commands::Parse {
            formula,
            locale,
            strict,
            tolerant,
            json,
        } => {
            let settings = ContextSettings::default()
                .with_locale(&locale)
                .strict(strict)
                .ignore_errors(tolerant);
            parse_formula(&formula, settings, json, verbose)
        }
        Commands::Eval {
            formula,
            locale,
            cells,
        } => eval_formula(&formula, ContextSettings::default().with_locale(&locale), &cells, verbose),
        Commands::Tokens {
            formula,
            locale,
            json,
        } => list_tokens(&formula, ContextSettings::default().with_locale(&locale), json),
    }
}

fn parse_formula(formula: &str, settings: ContextSettings, json: bool, verbose: bool) -> Result<()> {
    let context = DefaultParserContext::with_settings(settings).with_functions(&demo_functions());

    if json {
        let ast = FormulaParser::parse_ast(formula, &context)
            .map_err(|err| report(err, verbose))
            .with_context(|| format!("Failed to parse '{}'", formula))?;
        let text = serde_json::to_string_pretty(&ast).context("Failed to serialize syntax tree")?;
        println!("{}", text);
        return Ok(());
    }

    let term = FormulaParser::parse(formula, &context)
        .map_err(|err| report(err, verbose))
        .with_context(|| format!("Failed to parse '{}'", formula))?;
    if verbose && term.is_invalid() {
        for token in FormulaParser::token_infos(formula, &context)
            .iter()
            .filter(|token| token.invalid)
        {
            eprintln!("{}", diagnostic_for_token(token));
        }
    }
    println!("{}", term.to_locale_string(&context.separators()));
    Ok(())
}

fn eval_formula(
    formula: &str,
    settings: ContextSettings,
    cells: &[String],
    verbose: bool,
) -> Result<()> {
    let sheet = Sheet::new();
    let context = SheetContext::new(&sheet, settings, &demo_functions());

    for definition in cells {
        let (name, cell_formula) = definition
            .split_once('=')
            .ok_or_else(|| anyhow!("Cell definition '{}' is not NAME=FORMULA", definition))?;
        sheet.set(&context, name.trim(), cell_formula)?;
    }
    // one pass per cell settles any acyclic chain regardless of definition order
    sheet.recalc(cells.len().max(1));

    let cyclic = sheet.cyclic_cells();
    if !cyclic.is_empty() {
        eprintln!("Warning: reference cycle through {}", cyclic.join(", "));
    }

    let term = FormulaParser::parse(formula, &context)
        .map_err(|err| report(err, verbose))
        .with_context(|| format!("Failed to parse '{}'", formula))?;
    let cell = Cell::with_term(term);
    cell.evaluate();
    let value = cell.value();
    log::debug!("'{}' evaluated to {} {}", formula, value.type_name(), value);

    if verbose {
        for reference in cell.references() {
            eprintln!("reads {}", reference);
        }
    }
    println!("{}", value);

    cell.dispose();
    sheet.clear();
    Ok(())
}

fn list_tokens(formula: &str, settings: ContextSettings, json: bool) -> Result<()> {
    let context = DefaultParserContext::with_settings(settings).with_functions(&demo_functions());
    let tokens = FormulaParser::token_infos(formula, &context);

    if json {
        let text = serde_json::to_string_pretty(&tokens).context("Failed to serialize tokens")?;
        println!("{}", text);
        return Ok(());
    }

    let mut out = io::stdout().lock();
    for token in &tokens {
        writeln!(
            out,
            "{:>4}..{:<4} {:<10} {:<5} {}{}",
            token.start,
            token.end,
            format!("{:?}", token.kind).to_lowercase(),
            token.depth,
            token.text,
            if token.invalid { "  (invalid)" } else { "" }
        )
        .context("Failed to write to stdout")?;
    }
    Ok(())
}

/// Print the error in structured form when verbose, then hand it on.
fn report(err: ParserError, verbose: bool) -> ParserError {
    if verbose {
        let diagnostic = serde_json::json!({
            "name": err.name,
            "message": err.message,
            "index": err.index,
            "code": err.code.0,
            "category": err.code.category(),
        });
        eprintln!("{}", diagnostic);
    }
    err
}

fn diagnostic_for_token(token: &TokenInfo) -> serde_json::Value {
    serde_json::json!({
        "invalid": token.kind,
        "text": token.text,
        "start": token.start,
        "end": token.end,
    })
}

//! dumppdf - dump PDF objects as XML
//!
//! Prints selected objects, every object, or just the trailers of a PDF
//! file. Warnings recorded while reading go to stderr.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, ArgGroup, Parser};
use quire_core::{DocumentStore, PDFObjRef, PDFObject, PasswordType, PdfError, ReadOptions};
use tracing_subscriber::EnvFilter;

/// Escape bytes for XML output.
fn escape(s: &[u8]) -> String {
    let mut result = String::with_capacity(s.len());
    for &byte in s {
        match byte {
            b'&' => result.push_str("&amp;"),
            b'<' => result.push_str("&lt;"),
            b'>' => result.push_str("&gt;"),
            b'"' => result.push_str("&quot;"),
            b'\'' => result.push_str("&#39;"),
            b'\\' => result.push_str("&#92;"),
            0..=31 | 127..=255 => result.push_str(&format!("&#{byte};")),
            _ => result.push(byte as char),
        }
    }
    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamCodec {
    /// Attributes only.
    None,
    /// Undecoded payload, written as is.
    Raw,
    /// Decoded payload, written as is.
    Binary,
    /// Attributes plus escaped decoded payload.
    Text,
}

/// Dump a PDF object as XML.
fn dumpxml<W: Write>(
    out: &mut W,
    doc: &DocumentStore,
    obj: &PDFObject,
    codec: StreamCodec,
) -> Result<()> {
    match obj {
        PDFObject::Null => write!(out, "<null />")?,
        PDFObject::Bool(b) => write!(out, "<boolean>{b}</boolean>")?,
        PDFObject::Int(n) => write!(out, "<number>{n}</number>")?,
        PDFObject::Real(n) => write!(out, "<number>{n}</number>")?,
        PDFObject::TextString(_) | PDFObject::ByteString(_) => {
            let s = obj.as_string()?;
            write!(out, r#"<string size="{}">{}</string>"#, s.len(), escape(s))?;
        }
        PDFObject::Name(name) => write!(out, "<literal>{}</literal>", escape(name.as_bytes()))?,
        PDFObject::Array(arr) => {
            writeln!(out, r#"<list size="{}">"#, arr.len())?;
            for item in arr {
                dumpxml(out, doc, item, codec)?;
                writeln!(out)?;
            }
            write!(out, "</list>")?;
        }
        PDFObject::Dict(dict) => {
            writeln!(out, r#"<dict size="{}">"#, dict.len())?;
            for (k, v) in dict {
                writeln!(out, "<key>{}</key>", escape(k.as_bytes()))?;
                write!(out, "<value>")?;
                dumpxml(out, doc, v, codec)?;
                writeln!(out, "</value>")?;
            }
            write!(out, "</dict>")?;
        }
        PDFObject::Stream(stream) => match codec {
            StreamCodec::Raw => out.write_all(stream.get_rawdata())?,
            StreamCodec::Binary => out.write_all(&doc.stream_data(stream)?)?,
            StreamCodec::Text | StreamCodec::None => {
                writeln!(out, "<stream>")?;
                writeln!(out, "<props>")?;
                dumpxml(out, doc, &PDFObject::Dict(stream.attrs.clone()), codec)?;
                writeln!(out)?;
                writeln!(out, "</props>")?;
                if codec == StreamCodec::Text {
                    let data = doc.stream_data(stream)?;
                    writeln!(out, r#"<data size="{}">{}</data>"#, data.len(), escape(&data))?;
                }
                write!(out, "</stream>")?;
            }
        },
        PDFObject::Ref(r) => write!(out, r#"<ref id="{}" gen="{}" />"#, r.objid, r.genno)?,
    }
    Ok(())
}

fn dumptrailer<W: Write>(out: &mut W, doc: &DocumentStore) -> Result<()> {
    if doc.xref().is_fallback() {
        tracing::warn!("no usable xref; this trailer was rebuilt by scanning the file");
    }
    writeln!(out, "<trailer>")?;
    dumpxml(out, doc, &PDFObject::Dict(doc.trailer().clone()), StreamCodec::None)?;
    writeln!(out)?;
    writeln!(out, "</trailer>")?;
    writeln!(out)?;
    Ok(())
}

fn dumpallobjs<W: Write>(out: &mut W, doc: &DocumentStore, codec: StreamCodec) -> Result<()> {
    write!(out, "<pdf>")?;
    for (objid, genno) in doc.object_ids() {
        match doc.resolve(&PDFObjRef::new(objid, genno)) {
            Ok(obj) => {
                writeln!(out, r#"<object id="{objid}" gen="{genno}">"#)?;
                dumpxml(out, doc, &obj, codec)?;
                writeln!(out)?;
                writeln!(out, "</object>")?;
                writeln!(out)?;
            }
            Err(e @ PdfError::FileNotDecrypted) => return Err(e.into()),
            Err(e) => tracing::warn!("object {objid} {genno}: {e}"),
        }
    }
    dumptrailer(out, doc)?;
    write!(out, "</pdf>")?;
    Ok(())
}

/// Walk `/Outlines` and print each item's title and destination.
fn dumpoutline<W: Write>(out: &mut W, doc: &DocumentStore) -> Result<()> {
    writeln!(out, "<outlines>")?;
    let catalog = doc.catalog()?;
    if let Some(outlines) = catalog.get("Outlines") {
        let outlines = doc.resolve_value(outlines)?;
        if let Some(first) = outlines.get("First") {
            dump_outline_items(out, doc, first)?;
        }
    }
    writeln!(out, "</outlines>")?;
    Ok(())
}

fn dump_outline_items<W: Write>(out: &mut W, doc: &DocumentStore, first: &PDFObject) -> Result<()> {
    // Depth-first with an explicit stack; seen guards against malformed
    // sibling loops.
    let mut stack = vec![(first.clone(), 0usize)];
    let mut seen = HashSet::new();
    while let Some((item, level)) = stack.pop() {
        if let PDFObject::Ref(r) = &item
            && !seen.insert(*r)
        {
            tracing::warn!("outline item {r} visited twice");
            continue;
        }
        let item = doc.resolve_value(&item)?;
        let Ok(dict) = item.as_dict() else {
            continue;
        };

        let title = match dict.get("Title") {
            Some(title) => match doc.resolve_value(title)? {
                PDFObject::TextString(text) => text.to_string(),
                PDFObject::ByteString(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                _ => String::new(),
            },
            None => String::new(),
        };
        writeln!(
            out,
            r#"<outline level="{level}" title="{}">"#,
            escape(title.as_bytes())
        )?;
        if let Some(dest) = dict.get("Dest") {
            write!(out, "<dest>")?;
            dumpxml(out, doc, &doc.resolve_value(dest)?, StreamCodec::None)?;
            writeln!(out, "</dest>")?;
        }
        writeln!(out, "</outline>")?;

        if let Some(next) = dict.get("Next") {
            stack.push((next.clone(), level));
        }
        if let Some(child) = dict.get("First") {
            stack.push((child.clone(), level + 1));
        }
    }
    Ok(())
}

fn dumppdf<W: Write>(
    out: &mut W,
    doc: &DocumentStore,
    objids: &[u32],
    codec: StreamCodec,
) -> Result<()> {
    if objids.is_empty() {
        dumptrailer(out, doc)?;
    }
    let ids = doc.object_ids();
    for &objid in objids {
        let genno = ids
            .iter()
            .find(|(id, _)| *id == objid)
            .map_or(0, |&(_, genno)| genno);
        let obj = doc
            .resolve(&PDFObjRef::new(objid, genno))
            .with_context(|| format!("object {objid} {genno}"))?;
        dumpxml(out, doc, &obj, codec)?;
    }
    if !matches!(codec, StreamCodec::Raw | StreamCodec::Binary) {
        writeln!(out)?;
    }
    Ok(())
}

/// Dump PDF objects as XML.
#[derive(Parser, Debug)]
#[command(name = "dumppdf", version, about, long_about = None)]
#[command(group(ArgGroup::new("procedure").args(["extract_toc", "all"])))]
#[command(group(ArgGroup::new("stream_codec").args(["raw_stream", "binary_stream", "text_stream"])))]
struct Args {
    /// Path to the PDF file
    file: PathBuf,

    /// Object numbers to dump (repeat or separate with commas)
    #[arg(short = 'i', long = "objects", value_delimiter = ',', action = ArgAction::Append)]
    objects: Vec<u32>,

    /// Dump every object in the cross-reference index
    #[arg(short = 'a', long = "all")]
    all: bool,

    /// Dump the outline (table of contents)
    #[arg(short = 'T', long = "extract-toc")]
    extract_toc: bool,

    /// Write stream payloads undecoded
    #[arg(short = 'r', long = "raw-stream")]
    raw_stream: bool,

    /// Write stream payloads decoded
    #[arg(short = 'b', long = "binary-stream")]
    binary_stream: bool,

    /// Write stream payloads decoded and escaped inside the XML
    #[arg(short = 't', long = "text-stream")]
    text_stream: bool,

    /// Password for encrypted documents
    #[arg(short = 'p', long, default_value = "")]
    password: String,

    /// Fail on the first recoverable problem instead of repairing it
    #[arg(long)]
    strict: bool,

    /// More logging (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// Where to write the output, or "-" for stdout
    #[arg(short = 'o', long, default_value = "-")]
    outfile: String,
}

impl Args {
    fn codec(&self) -> StreamCodec {
        if self.raw_stream {
            StreamCodec::Raw
        } else if self.binary_stream {
            StreamCodec::Binary
        } else if self.text_stream {
            StreamCodec::Text
        } else {
            StreamCodec::None
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(args: &Args) -> Result<()> {
    let options = ReadOptions::default().with_strict(args.strict);
    let mut doc = DocumentStore::open_file(&args.file, options)
        .with_context(|| format!("cannot open {}", args.file.display()))?;

    if doc.decrypt(&args.password)? == PasswordType::NotDecrypted {
        bail!(PdfError::FileNotDecrypted);
    }

    let mut output: Box<dyn Write> = if args.outfile == "-" {
        Box::new(BufWriter::new(io::stdout()))
    } else {
        let file = File::create(&args.outfile)
            .with_context(|| format!("cannot create {}", args.outfile))?;
        Box::new(BufWriter::new(file))
    };

    let codec = args.codec();
    let result = if args.extract_toc {
        dumpoutline(&mut output, &doc)
    } else if args.all {
        dumpallobjs(&mut output, &doc, codec)
    } else {
        dumppdf(&mut output, &doc, &args.objects, codec)
    };
    output.flush()?;

    for diagnostic in doc.diagnostics().records() {
        eprintln!("warning: {diagnostic}");
    }
    result
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<PdfError>() {
                Some(e) if e.is_unreadable() => {
                    eprintln!("error: unreadable document: {err:#}");
                    ExitCode::from(2)
                }
                Some(PdfError::FileNotDecrypted) => {
                    eprintln!("error: the document is encrypted; pass the right password with -p");
                    ExitCode::from(3)
                }
                _ => {
                    eprintln!("error: {err:#}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

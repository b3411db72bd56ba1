use crate::domain::entities::writer::SearchHit;
use crate::domain::ports::vector_store::WriterFilter;
use crate::domain::values::metric::DistanceMetric;
use crate::WriterSearch;
use std::future::Future;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{error, info};

/// Why the question loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskExit {
    EndOfInput,
    Interrupted,
}

/// Answer one question per input line until the input ends or `shutdown`
/// resolves. `shutdown` is raced against reading a line and against the
/// search itself, so an interrupt during a slow query is not lost.
pub async fn ask_loop<R, S, W>(
    engine: &WriterSearch,
    input: R,
    k: usize,
    metric: DistanceMetric,
    shutdown: S,
    out: &mut W,
) -> std::io::Result<AskExit>
where
    R: AsyncBufRead + Unpin,
    S: Future,
    W: Write,
{
    tokio::pin!(shutdown);
    let mut lines = input.lines();
    writeln!(out, "Ask about a writer (Ctrl-C to quit):")?;

    loop {
        let line = tokio::select! {
            _ = &mut shutdown => return interrupted(out),
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            return Ok(AskExit::EndOfInput);
        };
        if line.trim().is_empty() {
            continue;
        }

        let answer = tokio::select! {
            _ = &mut shutdown => return interrupted(out),
            answer = engine.search_text(&line, k, metric, WriterFilter::default()) => answer,
        };
        match answer {
            Ok(hits) => print_hits(out, &hits)?,
            Err(e) => error!("{e}"),
        }
    }
}

fn interrupted<W: Write>(out: &mut W) -> std::io::Result<AskExit> {
    writeln!(out)?;
    info!("Interrupted, leaving question loop");
    Ok(AskExit::Interrupted)
}

pub fn print_hits<W: Write>(out: &mut W, hits: &[SearchHit]) -> std::io::Result<()> {
    if hits.is_empty() {
        writeln!(out, "No writers found.")?;
        return Ok(());
    }
    for (rank, hit) in hits.iter().enumerate() {
        writeln!(
            out,
            "{}. {} (distance {:.4})",
            rank + 1,
            hit.writer.full_name,
            hit.distance
        )?;
        if !hit.writer.notable_works.is_empty() {
            writeln!(out, "   Notable works: {}", hit.writer.notable_works.join(", "))?;
        }
        writeln!(out, "   {}", hit.writer.description)?;
    }
    Ok(())
}

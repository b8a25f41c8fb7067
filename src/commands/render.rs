use crate::presentation::{
    AnalysisView, BacktestView, ErrorBanner, MetricCard, MonteCarloView, Polarity, Presentation,
};
use anyhow::Result;
use std::fmt::Write;

fn polarity_marker(polarity: Polarity) -> &'static str {
    match polarity {
        Polarity::Positive => "+",
        Polarity::Negative => "-",
        Polarity::Neutral => " ",
    }
}

fn write_cards(out: &mut String, cards: &[MetricCard]) -> std::fmt::Result {
    for card in cards {
        write!(
            out,
            "  [{}] {:<24} {:>16}",
            polarity_marker(card.polarity),
            card.label,
            card.display
        )?;
        if let Some(subtitle) = card.subtitle {
            write!(out, "  {}", subtitle)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_banner(out: &mut String, banner: &ErrorBanner) -> std::fmt::Result {
    writeln!(out, "! {}: {}", banner.title, banner.message)?;
    if let Some(data_points) = banner.data_points {
        writeln!(out, "  data points: {}", data_points)?;
    }
    if let Some(date_range) = &banner.date_range {
        writeln!(out, "  date range: {}", date_range)?;
    }
    Ok(())
}

fn write_backtest(out: &mut String, view: &BacktestView) -> std::fmt::Result {
    if let Some(banner) = &view.banner {
        write_banner(out, banner)?;
    }
    writeln!(out, "Backtest results ({} trades)", view.trade_count)?;
    write_cards(out, &view.cards)?;

    let equity = &view.equity;
    if let (Some(first), Some(last)) = (equity.values.first(), equity.values.last()) {
        writeln!(
            out,
            "Equity curve: {} points, {:.2} -> {:.2}, {} decreases",
            equity.values.len(),
            first,
            last,
            equity.decreases.len()
        )?;
    }
    Ok(())
}

fn write_analysis(out: &mut String, analysis: &AnalysisView) -> std::fmt::Result {
    writeln!(out, "Analysis")?;
    match analysis {
        AnalysisView::Pending => writeln!(out, "  Analyzing results..."),
        AnalysisView::Unavailable { placeholder } => writeln!(out, "  {}", placeholder),
        AnalysisView::Narrative { text } => writeln!(out, "  {}", text),
        AnalysisView::Structured { analysis } => {
            let overall = &analysis.overall_assessment;
            writeln!(out, "  Rating: {}", overall.rating)?;
            writeln!(out, "  {}", overall.summary)?;
            let sections: [(&str, &[String]); 5] = [
                ("Key insights", &analysis.key_insights),
                ("Risk recommendations", &analysis.risk_management.recommendations),
                ("Strengths", &analysis.strategy_optimization.strengths),
                ("Weaknesses", &analysis.strategy_optimization.weaknesses),
                ("Improvements", &analysis.strategy_optimization.improvements),
            ];
            for (title, items) in sections {
                if items.is_empty() {
                    continue;
                }
                writeln!(out, "  {}:", title)?;
                for item in items {
                    writeln!(out, "    - {}", item)?;
                }
            }
            let sizing = &analysis.position_sizing;
            if !sizing.recommendation.is_empty() {
                writeln!(out, "  Position sizing: {}", sizing.recommendation)?;
            }
            Ok(())
        }
    }
}

fn write_monte_carlo(out: &mut String, view: &MonteCarloView) -> std::fmt::Result {
    if let Some(banner) = &view.banner {
        write_banner(out, banner)?;
    }
    writeln!(out, "Monte Carlo results")?;
    write_cards(out, &view.cards)?;

    if let Some(paths) = &view.paths {
        writeln!(
            out,
            "Simulated paths: showing {} of {}",
            paths.series.len(),
            paths.total_paths
        )?;
        if let Some(summary) = &paths.summary {
            writeln!(
                out,
                "  {} p5 {:.2} / p50 {:.2} / p95 {:.2}",
                paths.metric.label(),
                summary.p5,
                summary.p50,
                summary.p95
            )?;
        }
    }
    write_analysis(out, &view.analysis)
}

pub fn render_text(presentation: &Presentation) -> String {
    let mut out = String::new();
    let result = match presentation {
        Presentation::Builder { banner } => match banner {
            Some(banner) => write_banner(&mut out, banner),
            None => writeln!(out, "No results yet."),
        },
        Presentation::Loading { message, .. } => writeln!(out, "{}", message),
        Presentation::Backtest(view) => write_backtest(&mut out, view),
        Presentation::MonteCarlo(view) => write_monte_carlo(&mut out, view),
    };
    // Writing into a String cannot fail.
    debug_assert!(result.is_ok());
    out
}

pub fn print_presentation(presentation: &Presentation, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(presentation)?);
    } else {
        print!("{}", render_text(presentation));
    }
    Ok(())
}

//! migraine-report - Migraine diary summary CLI
//!
//! Reads an exported record history and prints the analytics snapshot,
//! medication-overuse risk, treatment correlations and cycle correlation.

use migraine_core::analytics::correlation::CorrelationResult;
use migraine_core::analytics::cycle::{CycleAnalysis, CyclePhase};
use migraine_core::analytics::{AnalyticsSnapshot, Distribution, MohAssessment, TreatmentKind};
use migraine_core::format::{format_day_change, format_hours, format_percentage, hour_display, weekday_name};
use migraine_core::{AnalyticsEngine, Calendar, Config, CycleSource, DateRange, HealthHistory};
use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "migraine-report")]
#[command(about = "Migraine diary analytics report")]
#[command(version)]
struct Args {
    /// Exported record history (JSON)
    history: PathBuf,

    /// Month to report on (format: YYYY-MM; default: current month)
    #[arg(long)]
    month: Option<String>,

    /// Year to report on
    #[arg(long, conflicts_with = "month")]
    year: Option<i32>,

    /// First day of a custom range (YYYY-MM-DD)
    #[arg(long, requires = "to", conflicts_with_all = ["month", "year"])]
    from: Option<NaiveDate>,

    /// Last day of a custom range (YYYY-MM-DD)
    #[arg(long, requires = "from")]
    to: Option<NaiveDate>,

    /// Export format (json)
    #[arg(long)]
    export: Option<String>,
}

/// Everything the report shows, computed once.
struct Report {
    title: String,
    snapshot: AnalyticsSnapshot,
    moh: MohAssessment,
    correlations: Vec<CorrelationResult>,
    cycle: Option<CycleAnalysis>,
    attack_free_days: Option<u32>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard = match migraine_core::logging::init(&config.logging) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {}", e);
            None
        }
    };

    let history = HealthHistory::load_json(&args.history)
        .with_context(|| format!("failed to read history from {}", args.history.display()))?;
    let history = Arc::new(history);
    let engine = AnalyticsEngine::from_config(&config, history.clone())
        .context("invalid analytics configuration")?;

    let (title, range) = resolve_range(&args, engine.calendar())?;
    let report = build_report(&engine, history.as_ref(), title, &range)?;

    match args.export.as_deref() {
        Some("json") => print_json(&report)?,
        Some(other) => anyhow::bail!("Unknown export format: {}. Use 'json'", other),
        None => print_terminal(&report),
    }

    Ok(())
}

fn resolve_range(args: &Args, calendar: &Calendar) -> Result<(String, DateRange)> {
    if let (Some(from), Some(to)) = (args.from, args.to) {
        if to < from {
            anyhow::bail!("--to must not be before --from");
        }
        return Ok((format!("{} to {}", from, to), calendar.day_range(from, to)));
    }

    if let Some(year) = args.year {
        let first = NaiveDate::from_ymd_opt(year, 1, 1).context("Invalid year")?;
        let last = NaiveDate::from_ymd_opt(year, 12, 31).context("Invalid year")?;
        return Ok((year.to_string(), calendar.day_range(first, last)));
    }

    let (year, month) = match &args.month {
        Some(month_str) => {
            // Parse YYYY-MM format
            let parts: Vec<&str> = month_str.split('-').collect();
            if parts.len() != 2 {
                anyhow::bail!("Invalid month format. Use YYYY-MM (e.g., 2024-12)");
            }
            let year: i32 = parts[0].parse().context("Invalid year")?;
            let month: u32 = parts[1].parse().context("Invalid month")?;
            (year, month)
        }
        None => {
            let today = calendar.day_of(Utc::now());
            (today.year(), today.month())
        }
    };
    let range = calendar
        .month_range(year, month)
        .context("Month must be between 1 and 12")?;
    Ok((format!("{:04}-{:02}", year, month), range))
}

fn build_report(
    engine: &AnalyticsEngine,
    history: &HealthHistory,
    title: String,
    range: &DateRange,
) -> Result<Report> {
    let snapshot = engine.compute(range).context("failed to compute snapshot")?;
    let moh = engine.check_moh_risk(range, &history.attacks);

    let mut correlations = Vec::new();
    for kind in [TreatmentKind::Medication, TreatmentKind::TcmTreatment] {
        if let Some(result) = engine
            .analyze_correlation_default(kind)
            .context("failed to analyze treatment correlation")?
        {
            correlations.push(result);
        }
    }

    let cycle = engine
        .analyze_cycles_from(history as &dyn CycleSource)
        .context("failed to read cycle samples")?;
    let today = engine.calendar().day_of(Utc::now());
    let attack_free_days = engine.attack_free_streak(today)?;

    Ok(Report {
        title,
        snapshot,
        moh,
        correlations,
        cycle,
        attack_free_days,
    })
}

fn print_terminal(report: &Report) {
    let snap = &report.snapshot;

    // Header
    println!();
    println!("╭{}╮", "─".repeat(60));
    println!("│{:^60}│", format!("Migraine Report: {}", report.title));
    println!("╰{}╯", "─".repeat(60));
    println!();

    if snap.is_empty() {
        println!("  No attacks or health events recorded in this period.");
        println!();
    } else {
        print_summary(snap);
        print_distributions(snap);
        print_medication(snap);
    }

    print_moh(&report.moh);
    print_correlations(&report.correlations);
    print_cycle(report.cycle.as_ref());

    if let Some(days) = report.attack_free_days {
        println!(
            "ATTACK-FREE: {} day{}",
            days,
            if days == 1 { "" } else { "s" }
        );
        println!();
    }
}

fn print_summary(snap: &AnalyticsSnapshot) {
    println!("SUMMARY");
    println!(
        "   Attacks:   {:<12} Attack days: {}",
        snap.totals.attacks, snap.totals.attack_days
    );
    println!(
        "   Ongoing:   {:<12} Events:      {}",
        snap.totals.ongoing_attacks, snap.totals.health_events
    );
    if snap.duration.completed_attacks > 0 {
        println!(
            "   Duration:  avg {}, shortest {}, longest {}",
            format_hours(snap.duration.average_hours),
            format_hours(snap.duration.shortest_hours),
            format_hours(snap.duration.longest_hours)
        );
    }
    println!(
        "   Intensity: avg {:.1}  (mild {}, moderate {}, severe {})",
        snap.intensity.average, snap.intensity.mild, snap.intensity.moderate, snap.intensity.severe
    );
    if let Some(hour) = snap.time_patterns.peak_hour {
        println!("   Peak hour: {}", hour_display(hour));
    }
    if let Some(day) = snap.time_patterns.busiest_weekday {
        println!("   Busiest:   {}", weekday_name(day as usize));
    }
    if snap.aura.attacks_with_aura > 0 {
        println!(
            "   Aura:      {} attacks ({})",
            snap.aura.attacks_with_aura,
            format_percentage(snap.aura.percentage)
        );
    }
    if snap.weather.attacks_with_weather > 0 {
        println!(
            "   Weather:   {} of {} attacks in high-risk conditions",
            snap.weather.high_risk_attacks, snap.weather.attacks_with_weather
        );
    }
    println!();
}

fn print_distribution(title: &str, dist: &Distribution, noun: &str) {
    if dist.is_empty() {
        return;
    }
    println!("{} ({})", title, dist.denominator_label(noun));
    for entry in dist.top(5) {
        println!(
            "   {:<24} {:>4}  {:>6}",
            entry.label,
            entry.count,
            format_percentage(entry.percentage)
        );
    }
    println!();
}

fn print_distributions(snap: &AnalyticsSnapshot) {
    print_distribution("PAIN LOCATIONS", &snap.locations, "locations");
    print_distribution("PAIN QUALITIES", &snap.qualities, "qualities");
    print_distribution("SYMPTOMS", &snap.symptoms, "attacks");
    print_distribution("TRIGGERS", &snap.triggers, "triggers");
}

fn print_medication(snap: &AnalyticsSnapshot) {
    let t = &snap.treatments;
    println!("MEDICATION");
    println!(
        "   Acute:      {} doses on {} days",
        t.acute_doses, t.acute_days
    );
    println!(
        "   Preventive: {} doses on {} days (adherence {})",
        t.preventive_doses,
        t.preventive_days,
        format_percentage(snap.adherence.adherence_rate)
    );
    if t.tcm_treatments > 0 || t.surgeries > 0 {
        println!(
            "   TCM:        {:<10} Surgeries: {}",
            t.tcm_treatments, t.surgeries
        );
    }
    println!();
    print_distribution("TOP ACUTE MEDICATIONS", &snap.medication.acute.top_medications, "doses");
}

fn print_moh(moh: &MohAssessment) {
    println!("MEDICATION OVERUSE RISK");
    let unit = if moh.is_multi_month() { "days/month (avg)" } else { "days" };
    println!(
        "   Level: {:<10} Acute medication: {} {}",
        moh.risk_level.as_str(),
        moh.display_days,
        unit
    );
    for breach in &moh.limit_breaches {
        println!(
            "   ! {} taken on {} days in {} (limit {})",
            breach.medication, breach.usage_days, breach.month, breach.limit
        );
    }
    println!("   {}", moh.advisory);
    println!();
}

fn print_correlations(results: &[CorrelationResult]) {
    if results.is_empty() {
        return;
    }
    println!("TREATMENT CORRELATION (before vs. after first treatment)");
    for r in results {
        println!(
            "   {:<14} {} -> {} attack days ({}), from {}",
            r.treatment.as_str(),
            r.before_attack_days,
            r.after_attack_days,
            format_day_change(r.before_attack_days, r.after_attack_days),
            r.treatment_day
        );
    }
    println!("   Descriptive comparison only, not a significance test.");
    println!();
}

fn print_cycle(cycle: Option<&CycleAnalysis>) {
    println!("MENSTRUAL CYCLE");
    let Some(analysis) = cycle else {
        println!("   Not enough cycle data (at least 2 complete cycles needed).");
        println!();
        return;
    };
    println!(
        "   Cycles: {:<10} Avg length: {:.1} days",
        analysis.cycles_analyzed, analysis.average_cycle_length
    );
    for phase in CyclePhase::ALL {
        println!(
            "   {:<14} {:>4}",
            phase.as_str(),
            analysis.count_of(phase)
        );
    }
    println!(
        "   Period-related: {}{}",
        format_percentage(analysis.period_correlation_percentage),
        if analysis.is_menstrual_migraine {
            "  (pattern suggests menstrual migraine)"
        } else {
            ""
        }
    );
    println!();
}

fn print_json(report: &Report) -> Result<()> {
    let json = serde_json::json!({
        "period": report.title,
        "snapshot": report.snapshot,
        "moh": report.moh,
        "correlations": report.correlations,
        "cycle": report.cycle,
        "attack_free_days": report.attack_free_days,
    });

    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

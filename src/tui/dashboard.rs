use crate::controller::TestController;
use crate::model::{IspInfo, MeasurementResult, TestPhase};
use crate::quality;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, Paragraph, Wrap},
    Frame,
};

/// Map a badge style token onto a terminal color.
fn token_color(token: &str) -> Color {
    match token {
        "green" | "green-dim" => Color::Green,
        "yellow" | "yellow-dim" => Color::Yellow,
        "red" | "red-dim" => Color::Red,
        _ => Color::DarkGray,
    }
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.2}")).unwrap_or_else(|| "N/A".into())
}

pub fn draw(area: Rect, f: &mut Frame, c: &TestController) {
    let mut constraints = vec![Constraint::Length(3)];
    let error = c.error().or_else(|| c.history().error());
    if error.is_some() {
        constraints.push(Constraint::Length(3));
    }
    constraints.push(Constraint::Min(10));
    if c.history().is_visible() {
        constraints.push(Constraint::Min(8));
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let mut idx = 0;
    draw_header(chunks[idx], f, c);
    idx += 1;

    if let Some(msg) = error {
        draw_error(chunks[idx], f, msg);
        idx += 1;
    }

    let main = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[idx]);
    idx += 1;
    draw_test_panel(main[0], f, c);
    draw_results_panel(main[1], f, c);

    if c.history().is_visible() {
        draw_history(chunks[idx], f, c);
    }

    if c.support_modal_visible() {
        draw_support_modal(area, f, c);
    }
}

fn draw_header(area: Rect, f: &mut Frame, c: &TestController) {
    let mut spans = vec![
        Span::styled(
            "SpeedTest Dashboard",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
    ];
    if let Some(isp) = c.current_isp() {
        spans.push(Span::styled(
            format!("Connected via {}  ", isp.name),
            Style::default().fg(Color::Cyan),
        ));
    }
    spans.push(Span::styled(
        "[t] test  [h] history  [s] support  [d] dismiss  [q] quit",
        Style::default().fg(Color::DarkGray),
    ));

    let p = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(p, area);
}

fn draw_error(area: Rect, f: &mut Frame, msg: &str) {
    let p = Paragraph::new(msg)
        .style(Style::default().fg(Color::Red))
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Error"));
    f.render_widget(p, area);
}

fn draw_test_panel(area: Rect, f: &mut Frame, c: &TestController) {
    let block = Block::default().borders(Borders::ALL).title("Speed Test");

    if c.is_running() {
        let progress = c.progress();
        let label = match progress.phase {
            TestPhase::None => "Initializing...".to_string(),
            phase => format!("Testing {}... {}%", phase.label(), progress.percent),
        };
        let inner = block.inner(area);
        f.render_widget(block, area);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Length(1)])
            .split(inner);
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(Color::Cyan))
            .percent(progress.percent.into());
        f.render_widget(gauge, rows[0]);
        f.render_widget(
            Paragraph::new(label).style(Style::default().fg(Color::DarkGray)),
            rows[1],
        );
    } else {
        let p = Paragraph::new(vec![
            Line::raw(""),
            Line::styled("Press [t] to start a speed test", Style::default().fg(Color::Cyan)),
        ])
        .block(block);
        f.render_widget(p, area);
    }
}

fn draw_results_panel(area: Rect, f: &mut Frame, c: &TestController) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Latest Results");

    let Some(result) = c.latest_result() else {
        let p = Paragraph::new(vec![
            Line::raw(""),
            Line::styled("No results yet", Style::default().fg(Color::DarkGray)),
        ])
        .block(block);
        f.render_widget(p, area);
        return;
    };

    let mut lines = result_lines(result);
    lines.extend(assessment_lines(result));
    let p = Paragraph::new(lines).wrap(Wrap { trim: true }).block(block);
    f.render_widget(p, area);
}

fn result_lines(result: &MeasurementResult) -> Vec<Line<'_>> {
    let mut lines = Vec::new();

    if let Some(qa) = result.quality_assessment.as_ref() {
        let badge = quality::classify(qa.quality.as_deref());
        let label = qa.quality.as_deref().unwrap_or("unknown").to_uppercase();
        lines.push(Line::from(vec![
            Span::raw("Quality:  "),
            Span::styled(
                format!(" {label} "),
                Style::default()
                    .fg(token_color(badge.color))
                    .bg(token_color(badge.background))
                    .add_modifier(Modifier::BOLD),
            ),
        ]));
    }

    lines.push(Line::from(vec![
        Span::raw("Ping:     "),
        Span::styled(
            format!("{} ms", fmt_opt(result.ping)),
            Style::default().fg(Color::Yellow),
        ),
    ]));
    lines.push(Line::from(vec![
        Span::raw("Download: "),
        Span::styled(
            format!("{} Mbps", fmt_opt(result.download_speed)),
            Style::default().fg(Color::Green),
        ),
    ]));
    lines.push(Line::from(vec![
        Span::raw("Upload:   "),
        Span::styled(
            format!("{} Mbps", fmt_opt(result.upload_speed)),
            Style::default().fg(Color::Blue),
        ),
    ]));

    if let Some(isp) = result.isp_info.as_ref().filter(|i| i.is_detected()) {
        lines.push(Line::from(vec![
            Span::raw("Provider: "),
            Span::styled(isp.name.clone(), Style::default().fg(Color::Cyan)),
        ]));
    }
    if let Some(ts) = result.timestamp.as_deref() {
        lines.push(Line::styled(
            ts.to_string(),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if let Some(ip) = result.public_ip.as_deref() {
        lines.push(Line::styled(
            format!("Public IP: {ip}"),
            Style::default().fg(Color::DarkGray),
        ));
    }
    lines
}

fn assessment_lines(result: &MeasurementResult) -> Vec<Line<'_>> {
    let Some(qa) = result.quality_assessment.as_ref() else {
        return Vec::new();
    };
    let mut lines = Vec::new();
    if !qa.issues.is_empty() {
        lines.push(Line::styled(
            "Issues detected:",
            Style::default().fg(Color::DarkGray),
        ));
        for issue in &qa.issues {
            lines.push(Line::styled(
                format!("  - {issue}"),
                Style::default().fg(Color::Red),
            ));
        }
    }
    if !qa.recommendations.is_empty() {
        lines.push(Line::styled(
            "Recommendations:",
            Style::default().fg(Color::DarkGray),
        ));
        for rec in &qa.recommendations {
            lines.push(Line::styled(
                format!("  - {rec}"),
                Style::default().fg(Color::Yellow),
            ));
        }
    }
    if qa.should_contact_support {
        lines.push(Line::styled(
            "Press [s] to contact support",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }
    lines
}

fn draw_history(area: Rect, f: &mut Frame, c: &TestController) {
    let entries = c.history().entries();
    let mut lines = Vec::new();

    if entries.is_empty() {
        lines.push(Line::styled(
            "No test history available yet",
            Style::default().fg(Color::DarkGray),
        ));
    } else {
        lines.push(Line::styled(
            format!(
                "{:>10}  {:>14}  {:>12}  Timestamp",
                "Ping (ms)", "Download (Mbps)", "Upload (Mbps)"
            ),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        for entry in entries {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("{:>10}", fmt_opt(entry.ping)),
                    Style::default().fg(Color::Yellow),
                ),
                Span::styled(
                    format!("  {:>14}", fmt_opt(entry.download_speed)),
                    Style::default().fg(Color::Green),
                ),
                Span::styled(
                    format!("  {:>12}", fmt_opt(entry.upload_speed)),
                    Style::default().fg(Color::Blue),
                ),
                Span::styled(
                    format!("  {}", entry.timestamp.as_deref().unwrap_or("-")),
                    Style::default().fg(Color::DarkGray),
                ),
            ]));
        }
    }

    let p = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Test History"));
    f.render_widget(p, area);
}

/// Support-contact overlay, fed by the shared provider reference and the
/// latest quality assessment. Presentation-only consumer of the escalation
/// signal.
fn draw_support_modal(area: Rect, f: &mut Frame, c: &TestController) {
    let modal = centered_rect(60, 60, area);
    f.render_widget(Clear, modal);

    let mut lines = vec![Line::styled(
        "Connection Issues Detected",
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    )];

    if let Some(qa) = c
        .latest_result()
        .and_then(|r| r.quality_assessment.as_ref())
    {
        let badge = quality::classify(qa.quality.as_deref());
        lines.push(Line::from(vec![
            Span::raw("Connection quality: "),
            Span::styled(
                qa.quality.as_deref().unwrap_or("unknown").to_uppercase(),
                Style::default().fg(token_color(badge.color)),
            ),
        ]));
        for issue in &qa.issues {
            lines.push(Line::styled(
                format!("  - {issue}"),
                Style::default().fg(Color::Red),
            ));
        }
        for rec in &qa.recommendations {
            lines.push(Line::styled(
                format!("  - {rec}"),
                Style::default().fg(Color::Yellow),
            ));
        }
    }

    if let Some(isp) = c.current_isp() {
        lines.push(Line::raw(""));
        lines.extend(contact_lines(isp));
    }

    lines.push(Line::raw(""));
    lines.push(Line::styled(
        "[esc] close",
        Style::default().fg(Color::DarkGray),
    ));

    let p = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Contact Support"),
    );
    f.render_widget(p, modal);
}

fn contact_lines(isp: &IspInfo) -> Vec<Line<'_>> {
    let mut lines = vec![Line::styled(
        format!("Contact {} Support", isp.name),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )];
    let mut push = |label: &str, value: Option<&str>| {
        if let Some(v) = value {
            lines.push(Line::from(vec![
                Span::styled(format!("{label:<10}"), Style::default().fg(Color::DarkGray)),
                Span::raw(v.to_string()),
            ]));
        }
    };
    push("Phone:", isp.support_phone.as_deref());
    push("Email:", isp.support_email.as_deref());
    push("WhatsApp:", isp.whatsapp.as_deref());
    push("Website:", isp.website.as_deref());
    push("Chat:", isp.live_chat.as_deref());
    if let Some(social) = isp.social_media.as_ref() {
        push("Twitter:", social.twitter.as_deref());
        push("Facebook:", social.facebook.as_deref());
    }
    lines
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

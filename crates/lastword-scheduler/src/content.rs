// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rendering of outbound email and text bodies.

use chrono::{DateTime, Utc};

use lastword_core::{EntryKind, MessageRecord, Owner, TriggerCondition};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Everything a renderer may read.
pub struct RenderContext<'a> {
    pub kind: EntryKind,
    pub message: &'a MessageRecord,
    pub condition: &'a TriggerCondition,
    pub owner: &'a Owner,
    pub deadline: Option<DateTime<Utc>>,
    pub service_name: &'a str,
}

pub fn render(ctx: &RenderContext<'_>) -> Rendered {
    match ctx.kind {
        EntryKind::Reminder => render_reminder(ctx, false),
        EntryKind::FinalNotice => render_reminder(ctx, true),
        EntryKind::FinalDelivery => render_delivery(ctx),
    }
}

fn render_reminder(ctx: &RenderContext<'_>, last_call: bool) -> Rendered {
    let when = ctx
        .deadline
        .map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "soon".to_string());
    let subject = if last_call {
        format!("Final notice: \"{}\" will be delivered at {when}", ctx.message.title)
    } else {
        format!("Reminder: check in before {when}")
    };
    let line = format!(
        "Your message \"{}\" will be delivered to its recipients at {when} unless you check in.",
        ctx.message.title
    );
    Rendered {
        html: format!(
            "<p>Hi {},</p><p>{}</p><p>{}</p>",
            escape_html(&ctx.owner.name),
            escape_html(&line),
            escape_html(ctx.service_name)
        ),
        text: format!("{}: {line}", ctx.service_name),
        subject,
    }
}

fn render_delivery(ctx: &RenderContext<'_>) -> Rendered {
    let subject = format!("A message from {}: {}", ctx.owner.name, ctx.message.title);
    let notes = delivery_notes(ctx.condition);

    let mut html = format!(
        "<p>{} asked {} to deliver this message to you.</p><h2>{}</h2><div>{}</div>",
        escape_html(&ctx.owner.name),
        escape_html(ctx.service_name),
        escape_html(&ctx.message.title),
        escape_html(&ctx.message.body).replace('\n', "<br>")
    );
    let mut text = format!(
        "{} via {}: {}\n\n{}",
        ctx.owner.name, ctx.service_name, ctx.message.title, ctx.message.body
    );
    for note in &notes {
        html.push_str(&format!("<p><em>{}</em></p>", escape_html(note)));
        text.push_str("\n\n");
        text.push_str(note);
    }
    Rendered {
        subject,
        html,
        text,
    }
}

/// Security and location remarks appended to a final delivery.
///
/// The PIN itself is never rendered.
fn delivery_notes(condition: &TriggerCondition) -> Vec<String> {
    let mut notes = Vec::new();
    let security = &condition.security;
    if security.pin.is_some() {
        notes.push(
            "This message is PIN protected. Ask the sender's trusted contact for the PIN."
                .to_string(),
        );
    }
    if let Some(hours) = security.unlock_delay_hours {
        notes.push(format!("Access unlocks {hours} hours after delivery."));
    }
    if let Some(days) = security.expires_after_days {
        notes.push(format!("This message expires {days} days after delivery."));
    }
    if let Some(location) = condition
        .kind
        .panic_config()
        .and_then(|p| p.last_location.as_ref())
    {
        let accuracy = location
            .accuracy_m
            .map(|a| format!(" (within {a:.0} m)"))
            .unwrap_or_default();
        notes.push(format!("Last known location{accuracy}: {}", location.map_link()));
    }
    notes
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

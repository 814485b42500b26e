use crate::models::{Script, SeoReport};

pub const SEO_HEADERS: [&str; 10] = [
    "slot_id",
    "platform",
    "language",
    "title",
    "primary_hashtags",
    "secondary_hashtags",
    "long_tail",
    "branded",
    "trending",
    "keywords",
];

/// Header row as is, every data cell quoted with embedded quotes doubled.
pub fn build_csv(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(headers.join(","));
    for row in rows {
        let cells: Vec<String> = row.iter().map(|c| format!("\"{}\"", c.replace('"', "\"\""))).collect();
        lines.push(cells.join(","));
    }
    lines.join("\n")
}

pub fn seo_csv(report: &SeoReport) -> String {
    let rows: Vec<Vec<String>> = report
        .optimizations
        .iter()
        .map(|opt| {
            vec![
                opt.slot_id.clone().unwrap_or_default(),
                opt.platform.clone().unwrap_or_default(),
                opt.language.clone().unwrap_or_default(),
                opt.optimized_title.clone().unwrap_or_default(),
                opt.hashtags.primary.join(" "),
                opt.hashtags.secondary.join(" "),
                opt.hashtags.long_tail.join(" "),
                opt.hashtags.branded.join(" "),
                opt.hashtags.trending.join(" "),
                opt.keywords.join(", "),
            ]
        })
        .collect();
    build_csv(&SEO_HEADERS, &rows)
}

/// Plain-text rendering of one script; sections without content are left out.
pub fn script_text(script: &Script) -> String {
    let heading = format!(
        "# {} - {} {} ({})",
        script.slot_id, script.platform, script.content_type, script.language
    );
    let sections = [
        ("Hook", &script.hook),
        ("Script", &script.script_body),
        ("CTA", &script.cta),
        ("Caption", &script.caption),
        ("Visual notes", &script.visual_notes),
    ];

    let mut parts = vec![heading];
    for (title, body) in sections {
        if let Some(body) = body.as_deref().filter(|b| !b.is_empty()) {
            parts.push(format!("## {title}\n{body}\n"));
        }
    }
    parts.join("\n")
}

/// Every script in one file, each opened by a banner line.
pub fn all_scripts_text(scripts: &[Script]) -> String {
    scripts
        .iter()
        .map(|script| {
            let banner = format!(
                "═══ {} - {} {} ({}) ═══",
                script.slot_id, script.platform, script.content_type, script.language
            );
            let sections = [
                (&script.hook, "\nHOOK: "),
                (&script.script_body, "\nSCRIPT:\n"),
                (&script.cta, "\nCTA: "),
                (&script.caption, "\nCAPTION:\n"),
                (&script.visual_notes, "\nVISUAL NOTES: "),
            ];
            let mut parts = vec![banner];
            for (body, label) in sections {
                if let Some(body) = body.as_deref().filter(|b| !b.is_empty()) {
                    parts.push(format!("{label}{body}"));
                }
            }
            parts.push("\n".to_string());
            parts.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn script_filename(script: &Script) -> String {
    format!("{}_script.txt", script.slot_id)
}

//! Alert email rendering.

use chrono::{DateTime, Utc};

pub fn alert_subject(job_name: &str) -> String {
    format!("CronSentry Alert: Job '{}'", job_name)
}

/// HTML body for a missed-run alert. The dashboard link is only rendered
/// when a URL is configured.
pub fn alert_body(
    message: &str,
    job_name: &str,
    at: DateTime<Utc>,
    dashboard_url: Option<&str>,
) -> String {
    let mut body = String::with_capacity(512);
    body.push_str("<html>\n<body>\n<h2>CronSentry Alert</h2>\n");
    body.push_str(&format!("<p>{}</p>\n", escape_html(message)));
    body.push_str(&format!(
        "<p><strong>Job:</strong> {}</p>\n",
        escape_html(job_name)
    ));
    body.push_str(&format!("<p><strong>Time:</strong> {}</p>\n", at.to_rfc2822()));
    if let Some(url) = dashboard_url {
        body.push_str("<hr>\n");
        body.push_str(&format!(
            "<p>View details in your <a href=\"{}\">CronSentry Dashboard</a></p>\n",
            escape_html(url)
        ));
    }
    body.push_str("</body>\n</html>\n");
    body
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

//! Reminder message types, shared between the scheduler and the mail transports.

use serde::{Deserialize, Serialize};

use crate::types::{Habit, Task};

/// A fully rendered message handed to a mail transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body_text: String,
    pub body_html: String,
}

/// Periodic nudge for a habit. Mentions the streak as it is at send time.
pub fn habit_reminder(to: &str, name: &str, habit: &Habit) -> OutgoingEmail {
    let streak = match habit.streak {
        0 => "You haven't started a streak yet. Today is a good day to begin.".to_string(),
        1 => "Your current streak is 1 day. Keep it going!".to_string(),
        n => format!("Your current streak is {n} days. Keep it going!"),
    };
    let subject = format!("Reminder: {}", habit.name);
    let body_text = format!(
        "Hi {name},\n\nThis is your {} reminder for \"{}\".\n{streak}\n",
        habit.frequency, habit.name
    );
    let body_html = format!(
        "<p>Hi {},</p><p>This is your {} reminder for <strong>{}</strong>.</p><p>{}</p>",
        escape_html(name),
        escape_html(habit.frequency.as_str()),
        escape_html(&habit.name),
        escape_html(&streak),
    );
    OutgoingEmail {
        to: to.to_string(),
        subject,
        body_text,
        body_html,
    }
}

/// "Due soon" notice for a task. The subject always carries the task title.
pub fn task_due_reminder(to: &str, name: &str, task: &Task) -> OutgoingEmail {
    let due = task
        .due_date
        .map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "soon".to_string());
    let subject = format!("Task due soon: {}", task.title);
    let mut body_text = format!(
        "Hi {name},\n\nYour {} priority task \"{}\" is due at {due}.\n",
        task.priority, task.title
    );
    let mut body_html = format!(
        "<p>Hi {},</p><p>Your {} priority task <strong>{}</strong> is due at {}.</p>",
        escape_html(name),
        task.priority,
        escape_html(&task.title),
        escape_html(&due),
    );
    if let Some(desc) = task.description.as_deref().filter(|d| !d.is_empty()) {
        body_text.push_str(&format!("\n{desc}\n"));
        body_html.push_str(&format!("<p>{}</p>", escape_html(desc)));
    }
    OutgoingEmail {
        to: to.to_string(),
        subject,
        body_text,
        body_html,
    }
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

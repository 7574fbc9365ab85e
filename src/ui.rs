use colored::Colorize;
use inquire::ui::{Color, RenderConfig, StyleSheet, Styled};
use std::sync::atomic::{AtomicBool, Ordering};
use supports_color::Stream;

use crate::{
    CANCELLED_MESSAGE, Credential, PROMPT_ERR_CONTEXT, UI_CURRENT_MARKER, UI_HINT_LIST,
    UI_HINT_LOGIN, UI_INFO_PREFIX, UI_UNKNOWN_EMAIL, UI_WARNING_PREFIX, command_name,
};

static PLAIN: AtomicBool = AtomicBool::new(false);

const TABLE_HEADERS: [&str; 5] = ["INDEX", "PLAN", "SPACE", "EMAIL", "TYPE"];
const EMPTY_CELL: &str = "-";

pub fn set_plain(value: bool) {
    PLAIN.store(value, Ordering::Relaxed);
}

pub fn is_plain() -> bool {
    PLAIN.load(Ordering::Relaxed)
}

pub fn use_color_stdout() -> bool {
    supports_color(Stream::Stdout)
}

pub fn use_color_stderr() -> bool {
    supports_color(Stream::Stderr)
}

fn supports_color(stream: Stream) -> bool {
    if is_plain() {
        return false;
    }
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    supports_color::on(stream).is_some()
}

pub fn style_text<F>(text: &str, use_color: bool, style: F) -> String
where
    F: FnOnce(colored::ColoredString) -> colored::ColoredString,
{
    if use_color && !is_plain() {
        style(text.normal()).to_string()
    } else {
        text.to_string()
    }
}

pub fn format_cmd(command: &str, use_color: bool) -> String {
    let text = format!("`{command}`");
    style_text(&text, use_color, |text| text.yellow().bold())
}

pub fn format_action(message: &str, use_color: bool) -> String {
    let text = format!("✅ {message}");
    style_text(&text, use_color, |text| text.green().bold())
}

pub fn format_warning(message: &str, use_color: bool) -> String {
    let prefix = UI_WARNING_PREFIX;
    let mut lines = message.lines();
    let first = lines.next().unwrap_or_default();
    let mut text = format!("{prefix}{first}");
    let indent = " ".repeat(prefix.len());
    for line in lines {
        text.push('\n');
        text.push_str(&indent);
        text.push_str(line);
    }
    style_text(&text, use_color, |text| text.yellow().dimmed().italic())
}

pub fn format_cancel(use_color: bool) -> String {
    style_text(CANCELLED_MESSAGE, use_color, |text| text.dimmed().italic())
}

pub fn format_hint(message: &str, use_color: bool) -> String {
    if is_plain() {
        crate::msg1(UI_INFO_PREFIX, message)
    } else {
        let message = format!("\n\n{message}");
        style_text(&message, use_color, |text| text.italic())
    }
}

pub fn format_list_hint(use_color: bool) -> String {
    let list = format_command("ls", use_color);
    format_hint(&UI_HINT_LIST.replace("{list}", &list), use_color)
}

pub fn format_login_hint(use_color: bool) -> String {
    let login = format_command("login", use_color);
    format_hint(&UI_HINT_LOGIN.replace("{login}", &login), use_color)
}

pub fn format_section(title: &str, use_color: bool) -> String {
    style_text(title, use_color, |text| text.bold())
}

pub fn format_credential_label(credential: &Credential, is_current: bool, use_color: bool) -> String {
    let plan = credential.plan.as_deref().unwrap_or(EMPTY_CELL);
    let email = credential.email.as_deref().unwrap_or(UI_UNKNOWN_EMAIL);
    let badge = format_plan_badge(plan, use_color);
    let space = credential
        .team_space
        .as_deref()
        .map(|space| format!(" ({space})"))
        .unwrap_or_default();
    let marker = if is_current {
        style_text(UI_CURRENT_MARKER, use_color, |text| text.green().bold())
    } else {
        String::new()
    };
    let index = format!("[{}]", credential.index);
    if use_color {
        let email = if is_current {
            format!(" {email} ").white().on_green().to_string()
        } else {
            format!(" {email} ").white().on_magenta().to_string()
        };
        format!("{index} {badge}{email}{space}{marker}")
    } else {
        format!("{index} {badge} {email}{space}{marker}")
    }
}

fn format_plan_badge(plan: &str, use_color: bool) -> String {
    let plan_upper = plan.to_uppercase();
    if use_color {
        format!(" {plan_upper} ").white().on_bright_black().to_string()
    } else {
        format!("[{plan_upper}]")
    }
}

pub fn format_credential_table(
    credentials: &[Credential],
    active_index: Option<&str>,
    use_color: bool,
) -> String {
    let rows: Vec<[String; 5]> = credentials
        .iter()
        .map(|credential| {
            let index = if active_index == Some(credential.index.as_str()) {
                format!("{}*", credential.index)
            } else {
                credential.index.clone()
            };
            [
                index,
                cell(credential.plan.as_deref()),
                cell(credential.team_space.as_deref()),
                cell(credential.email.as_deref()),
                cell(credential.kind.as_deref()),
            ]
        })
        .collect();

    let mut widths = TABLE_HEADERS.map(|header| header.chars().count());
    for row in &rows {
        for (width, value) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(value.chars().count());
        }
    }

    let header = join_row(&TABLE_HEADERS.map(str::to_string), &widths);
    let separator = widths
        .iter()
        .map(|width| "-".repeat(*width))
        .collect::<Vec<_>>()
        .join("-|-");
    let mut lines = vec![
        style_text(&header, use_color, |text| text.bold()),
        style_text(&separator, use_color, |text| text.dimmed()),
    ];
    for (row, credential) in rows.iter().zip(credentials) {
        let line = join_row(row, &widths);
        if active_index == Some(credential.index.as_str()) {
            lines.push(style_text(&line, use_color, |text| text.green()));
        } else {
            lines.push(line);
        }
    }
    lines.join("\n")
}

fn cell(value: Option<&str>) -> String {
    value.unwrap_or(EMPTY_CELL).to_string()
}

fn join_row(row: &[String; 5], widths: &[usize; 5]) -> String {
    let padded: Vec<String> = row
        .iter()
        .zip(widths.iter())
        .map(|(value, width)| format!("{value:<width$}"))
        .collect();
    padded.join(" | ").trim_end().to_string()
}

pub fn inquire_select_render_config() -> RenderConfig<'static> {
    let mut config = if use_color_stderr() {
        let mut config = RenderConfig::default_colored();
        config.help_message = StyleSheet::new().with_fg(Color::DarkGrey);
        config
    } else {
        RenderConfig::empty()
    };
    config.prompt_prefix = Styled::new("");
    config.answered_prompt_prefix = Styled::new("");
    config
}

pub fn is_inquire_cancel(err: &inquire::error::InquireError) -> bool {
    matches!(
        err,
        inquire::error::InquireError::OperationCanceled
            | inquire::error::InquireError::OperationInterrupted
    )
}

pub fn handle_inquire_result<T>(
    result: Result<T, inquire::error::InquireError>,
    context: &str,
) -> Result<T, String> {
    match result {
        Ok(value) => Ok(value),
        Err(err) if is_inquire_cancel(&err) => Err(CANCELLED_MESSAGE.to_string()),
        Err(err) => Err(crate::msg2(PROMPT_ERR_CONTEXT, context, err)),
    }
}

const OUTPUT_INDENT: &str = " ";

pub fn print_output_block(message: &str) {
    let message = if is_plain() {
        message.to_string()
    } else {
        indent_output(message)
    };
    println!("\n{message}\n");
}

fn indent_output(message: &str) -> String {
    message
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{OUTPUT_INDENT}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_command(cmd: &str, use_color: bool) -> String {
    let name = command_name();
    let full = if cmd.is_empty() {
        name.to_string()
    } else {
        format!("{name} {cmd}")
    };
    format_cmd(&full, use_color)
}

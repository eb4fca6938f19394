use {
    crossterm::{
        QueueableCommand as _,
        style::{Color, ResetColor, SetForegroundColor},
    },
    std::{
        fmt::{self, Write as _},
        io::{self, IsTerminal as _, Write as _},
    },
    tracing::{
        Event, Level, Metadata, Subscriber,
        field::{Field, Visit},
    },
    tracing_subscriber::{Layer, layer::Context},
};

/// Prints log messages to stderr, which stays free of pasted data.
pub struct TermLayer;

impl<S: Subscriber> Layer<S> for TermLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        let color = if level == Level::ERROR || level == Level::WARN {
            Some(Color::Red)
        } else if level == Level::INFO {
            None
        } else {
            Some(Color::Grey)
        };
        // Nowhere to report a broken stderr.
        let _ = write_line(color, &format_event(event));
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        metadata
            .module_path()
            .is_some_and(|path| path.starts_with("stash"))
    }
}

fn format_event(event: &Event<'_>) -> String {
    let mut message = String::new();
    let mut fields = Vec::new();
    event.record(&mut DebugVisitor(&mut message, &mut fields));
    if !fields.is_empty() {
        let _ = write!(message, " ({})", fields.join(", "));
    }
    message
}

fn write_line(color: Option<Color>, text: &str) -> io::Result<()> {
    let mut stderr = io::stderr().lock();
    let color = color.filter(|_| stderr.is_terminal());
    if let Some(color) = color {
        stderr.queue(SetForegroundColor(color))?;
    }
    stderr.write_all(text.trim_end_matches('\n').as_bytes())?;
    if color.is_some() {
        stderr.queue(ResetColor)?;
    }
    stderr.write_all(b"\n")?;
    stderr.flush()
}

struct DebugVisitor<'a>(&'a mut String, &'a mut Vec<String>);

impl Visit for DebugVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.0, "{value:?}");
        } else {
            self.1.push(format!("{} = {:?}", field.name(), value));
        }
    }
}

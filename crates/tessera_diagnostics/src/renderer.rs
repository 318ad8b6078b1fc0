//! Problem rendering for console output.

use crate::problem::Problem;

/// Trait for rendering problems into formatted output strings.
pub trait ProblemRenderer {
    /// Renders a single problem into a formatted string.
    fn render(&self, problem: &Problem) -> String;
}

/// Renders problems in a compact terminal format.
///
/// Produces output like:
/// ```text
/// error[P101]: field `value` of `Bean` bean found in Tessera runtime: cannot serialize object of type `Socket`
///    = see: https://docs.tessera.build/...#config_cache:requirements:disallowed_types
///    = caused by: connection refused
/// ```
pub struct TerminalRenderer {
    /// Whether to use ANSI color codes in output.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Renders a report headline followed by every problem.
    pub fn render_report(&self, problems: &[Problem], total: usize) -> String {
        let mut out = match total {
            0 => return String::new(),
            1 => "1 problem was found storing the configuration cache.\n".to_string(),
            n => format!("{n} problems were found storing the configuration cache.\n"),
        };
        for problem in problems {
            out.push_str(&self.render(problem));
        }
        if total > problems.len() {
            out.push_str(&format!(
                "plus {} more problems. Please see the report for details.\n",
                total - problems.len()
            ));
        }
        out
    }

    fn paint(&self, problem: &Problem, text: String) -> String {
        if !self.color {
            return text;
        }
        let code = if problem.severity.is_error() { "31" } else { "33" };
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

impl ProblemRenderer for TerminalRenderer {
    fn render(&self, problem: &Problem) -> String {
        let mut out = String::new();

        let header = format!("{}[{}]", problem.severity, problem.code);
        out.push_str(&format!(
            "{}: {}: {}\n",
            self.paint(problem, header),
            problem.trace,
            problem.message
        ));

        if let Some(section) = problem.documentation {
            out.push_str(&format!("   = see: {}\n", section.url()));
        }

        if let Some(exception) = &problem.exception {
            out.push_str(&format!("   = caused by: {exception}\n"));
        }

        out
    }
}

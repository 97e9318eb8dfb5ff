pub mod test_helpers {
    use crate::event_source::{
        Event, KeyCode, KeyModifiers, MouseButton, MouseEventKind, SimulatedEventSource,
    };
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    /// Builder for simulated user input
    #[derive(Default)]
    pub struct TestScenarioBuilder {
        events: Vec<Event>,
    }

    impl TestScenarioBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn press_char(mut self, c: char) -> Self {
            self.events.push(SimulatedEventSource::char_key(c));
            self
        }

        pub fn press_ctrl_char(mut self, c: char) -> Self {
            self.events.push(SimulatedEventSource::ctrl_char_key(c));
            self
        }

        pub fn press_key(mut self, code: KeyCode) -> Self {
            self.events
                .push(SimulatedEventSource::key_event(code, KeyModifiers::empty()));
            self
        }

        pub fn press_enter(self) -> Self {
            self.press_key(KeyCode::Enter)
        }

        pub fn press_esc(self) -> Self {
            self.press_key(KeyCode::Esc)
        }

        pub fn press_tab(self) -> Self {
            self.press_key(KeyCode::Tab)
        }

        /// Types every char of `text` as a key press
        pub fn type_text(mut self, text: &str) -> Self {
            for c in text.chars() {
                self.events.push(SimulatedEventSource::char_key(c));
            }
            self
        }

        /// Press 'l' n times
        pub fn move_right(mut self, times: usize) -> Self {
            for _ in 0..times {
                self.events.push(SimulatedEventSource::char_key('l'));
            }
            self
        }

        /// Press 'j' n times
        pub fn move_down(mut self, times: usize) -> Self {
            for _ in 0..times {
                self.events.push(SimulatedEventSource::char_key('j'));
            }
            self
        }

        /// Left-button drag from one screen cell to another
        pub fn drag(mut self, from: (u16, u16), to: (u16, u16)) -> Self {
            self.events.push(SimulatedEventSource::mouse_event(
                MouseEventKind::Down(MouseButton::Left),
                from.0,
                from.1,
            ));
            self.events.push(SimulatedEventSource::mouse_event(
                MouseEventKind::Drag(MouseButton::Left),
                to.0,
                to.1,
            ));
            self.events.push(SimulatedEventSource::mouse_event(
                MouseEventKind::Up(MouseButton::Left),
                to.0,
                to.1,
            ));
            self
        }

        /// Quit the application (press 'q')
        pub fn quit(mut self) -> Self {
            self.events.push(SimulatedEventSource::char_key('q'));
            self
        }

        pub fn build(self) -> SimulatedEventSource {
            SimulatedEventSource::new(self.events)
        }
    }

    /// Create a test terminal for snapshot testing
    pub fn create_test_terminal(width: u16, height: u16) -> Terminal<TestBackend> {
        let backend = TestBackend::new(width, height);
        Terminal::new(backend).unwrap()
    }

    /// Capture the current terminal buffer as a string
    pub fn capture_terminal_state(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut lines = Vec::new();

        for y in 0..buffer.area.height {
            let mut line = String::new();
            for x in 0..buffer.area.width {
                line.push_str(buffer[(x, y)].symbol());
            }
            // Trim trailing whitespace from each line
            lines.push(line.trim_end().to_string());
        }

        // Remove trailing empty lines
        while lines.last().map(|l| l.is_empty()).unwrap_or(false) {
            lines.pop();
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::test_helpers::*;

    #[test]
    fn scenario_builder_collects_events() {
        let scenario = TestScenarioBuilder::new()
            .press_char('v')
            .move_right(2)
            .type_text("ok")
            .press_enter()
            .drag((1, 1), (4, 1))
            .quit()
            .build();

        assert_eq!(scenario.events.len(), 10);
    }
}

use std::fmt;

use tabled::builder::Builder;
use tabled::settings::Style;

use crate::conjecture::Conjecture;

impl fmt::Display for Conjecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = Builder::default();
        let mut header = vec!["state".to_string(), "output".to_string()];
        header.extend((0..self.num_inputs()).map(|i| format!("in {i}")));
        builder.push_record(header);

        for s in 0..self.num_states() as u32 {
            let mut row = vec![s.to_string()];
            row.push(if self.machine_type().is_output_state() {
                self.state_output(s).to_string()
            } else {
                "-".to_string()
            });
            for i in 0..self.num_inputs() {
                row.push(match self.transition(s, i) {
                    Some((o, t)) if self.machine_type().is_output_transition() => {
                        format!("{o}/{t}")
                    }
                    Some((_, t)) => t.to_string(),
                    None => "?".to_string(),
                });
            }
            builder.push_record(row);
        }

        let table = builder.build().with(Style::rounded()).to_string();
        write!(f, "{table}")
    }
}

use serde::Deserialize;

/// Snapshot of the simulation clock passed explicitly to boundary conditions
/// and time schemes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeState {
    pub value: f64,
    pub delta_t: f64,
    /// Previous step size; equals `delta_t` on the first step.
    pub delta_t0: f64,
    pub index: usize,
}

impl TimeState {
    pub fn new(value: f64, delta_t: f64) -> Self {
        Self {
            value,
            delta_t,
            delta_t0: delta_t,
            index: 0,
        }
    }

    /// Steady runs use a unit pseudo time step.
    pub fn steady() -> Self {
        Self::new(0.0, 1.0)
    }
}

impl Default for TimeState {
    fn default() -> Self {
        Self::steady()
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeControls {
    #[serde(default)]
    pub start_time: f64,
    pub end_time: f64,
    pub delta_t: f64,
    #[serde(default)]
    pub write_interval: Option<usize>,
}

/// Advances a [`TimeState`] from `start_time` to `end_time`.
#[derive(Clone, Debug)]
pub struct RunTime {
    state: TimeState,
    end_time: f64,
    write_interval: Option<usize>,
    /// Step size of the last completed step.
    last_delta_t: Option<f64>,
}

impl RunTime {
    pub fn new(controls: &TimeControls) -> Self {
        Self {
            state: TimeState::new(controls.start_time, controls.delta_t),
            end_time: controls.end_time,
            write_interval: controls.write_interval,
            last_delta_t: None,
        }
    }

    pub fn state(&self) -> TimeState {
        self.state
    }

    pub fn value(&self) -> f64 {
        self.state.value
    }

    pub fn index(&self) -> usize {
        self.state.index
    }

    /// True while another step fits before `end_time`.
    pub fn running(&self) -> bool {
        self.state.value < self.end_time - 0.5 * self.state.delta_t
    }

    /// Moves to the next time level and returns the new state.
    pub fn advance(&mut self) -> TimeState {
        if let Some(previous) = self.last_delta_t {
            self.state.delta_t0 = previous;
        }
        self.last_delta_t = Some(self.state.delta_t);
        self.state.value += self.state.delta_t;
        self.state.index += 1;
        log::info!("Time = {}", format_time(self.state.value));
        self.state
    }

    /// Changes the step size from the next step on.
    pub fn set_delta_t(&mut self, delta_t: f64) {
        self.state.delta_t = delta_t;
    }

    pub fn write_time(&self) -> bool {
        match self.write_interval {
            Some(n) if n > 0 => self.state.index % n == 0,
            _ => !self.running(),
        }
    }
}

fn format_time(t: f64) -> String {
    let s = format!("{:.6}", t);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_to_end_time() {
        let mut rt = RunTime::new(&TimeControls {
            start_time: 0.0,
            end_time: 0.3,
            delta_t: 0.1,
            write_interval: None,
        });
        let mut steps = 0;
        while rt.running() {
            rt.advance();
            steps += 1;
        }
        assert_eq!(steps, 3);
        assert!((rt.value() - 0.3).abs() < 1e-12);
        assert!(rt.write_time());
    }

    #[test]
    fn keeps_previous_step_size() {
        let mut rt = RunTime::new(&TimeControls {
            start_time: 0.0,
            end_time: 1.0,
            delta_t: 0.1,
            write_interval: Some(2),
        });
        assert_eq!(rt.state().delta_t0, 0.1);
        rt.set_delta_t(0.2);
        assert_eq!(rt.state().delta_t0, 0.1);
        assert_eq!(rt.state().delta_t, 0.2);
        rt.advance();
        rt.set_delta_t(0.05);
        let state = rt.advance();
        assert_eq!(state.delta_t0, 0.2);
        assert_eq!(state.delta_t, 0.05);
        assert_eq!(format_time(0.30000000000000004), "0.3");
    }
}

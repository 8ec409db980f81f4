// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

/// A mono voice rendered sample by sample by the mixer.
pub trait Source: Send {
    /// Renders the next sample, or None once the voice has finished.
    fn next_sample(&mut self) -> Option<f32>;

    /// Enters the release stage. Called at most once, at the scheduled release frame.
    fn release(&mut self);
}

/// A linear fade used for release stages.
#[derive(Debug, Clone, Copy)]
pub struct Fade {
    /// Total length of the fade in frames.
    length: u64,
    /// Frames rendered since the fade started, None if not started.
    position: Option<u64>,
}

impl Fade {
    /// Creates a fade lasting the given number of seconds at the given sample rate.
    pub fn new(seconds: f64, sample_rate: u32) -> Fade {
        Fade {
            length: ((seconds.max(0.0) * sample_rate as f64).round() as u64).max(1),
            position: None,
        }
    }

    /// Starts the fade. Later calls do not restart it.
    pub fn start(&mut self) {
        if self.position.is_none() {
            self.position = Some(0);
        }
    }

    /// Returns the gain for the current frame and advances, or None once the fade is done.
    pub fn next_gain(&mut self) -> Option<f32> {
        match self.position {
            None => Some(1.0),
            Some(position) if position >= self.length => None,
            Some(position) => {
                self.position = Some(position + 1);
                Some(1.0 - position as f32 / self.length as f32)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::Fade;

    #[test]
    fn test_fade() {
        let mut fade = Fade::new(1.0, 4);
        assert_eq!(Some(1.0), fade.next_gain());
        assert_eq!(Some(1.0), fade.next_gain());

        fade.start();
        assert_eq!(Some(1.0), fade.next_gain());
        assert_eq!(Some(0.75), fade.next_gain());
        fade.start();
        assert_eq!(Some(0.5), fade.next_gain());
        assert_eq!(Some(0.25), fade.next_gain());
        assert_eq!(None, fade.next_gain());
    }
}

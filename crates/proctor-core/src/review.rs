//! Review slides paged through before an exam.

use crate::model::Slide;

/// Position within an exam's review slides.
#[derive(Debug, Clone)]
pub struct ReviewCarousel<'a> {
    slides: &'a [Slide],
    active: usize,
}

impl<'a> ReviewCarousel<'a> {
    pub fn new(slides: &'a [Slide]) -> Self {
        Self { slides, active: 0 }
    }

    /// Jump to a slide; out-of-range targets are clamped.
    pub fn go_to(&mut self, index: usize) -> usize {
        self.active = index.min(self.slides.len().saturating_sub(1));
        self.active
    }

    pub fn next_slide(&mut self) -> usize {
        self.go_to(self.active + 1)
    }

    pub fn prev_slide(&mut self) -> usize {
        self.go_to(self.active.saturating_sub(1))
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn current(&self) -> Option<&'a Slide> {
        self.slides.get(self.active)
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn is_last_slide(&self) -> bool {
        self.active + 1 >= self.slides.len()
    }

    /// The exam opens once the candidate has reached the last slide.
    pub fn can_take_exam(&self) -> bool {
        self.is_last_slide()
    }
}

use std::time::{Duration, Instant};

use boardconfig::{BoardItem, SlideOrder, SlideshowSettings};
use rand::prelude::*;

#[derive(Debug, thiserror::Error)]
pub enum SlideshowError {
    #[error("board has no image or video items")]
    Empty,
    #[error("slide {index} out of range (board has {len} slides)")]
    OutOfRange { index: usize, len: usize },
}

/// A displayable board item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slide {
    pub url: String,
    pub is_video: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlideChange {
    /// Position of the slide in the current slide list.
    pub index: usize,
    pub slide: Slide,
    pub started_at: Instant,
}

/// Advances through the visual items of a board on a fixed interval.
pub struct Slideshow {
    slides: Vec<Slide>,
    mode: SlideOrder,
    interval: Duration,
    order: Vec<usize>,
    cursor: usize,
    paused: bool,
    last_started: Instant,
    rng: StdRng,
}

impl Slideshow {
    pub fn new(
        items: &[BoardItem],
        settings: &SlideshowSettings,
        seed: u64,
        now: Instant,
    ) -> Result<Self, SlideshowError> {
        let slides: Vec<Slide> = items
            .iter()
            .filter(|item| item.is_visual())
            .filter_map(|item| {
                item.url().map(|url| Slide {
                    url: url.to_string(),
                    is_video: item.is_video(),
                })
            })
            .collect();
        if slides.is_empty() {
            return Err(SlideshowError::Empty);
        }
        if settings.start >= slides.len() {
            return Err(SlideshowError::OutOfRange {
                index: settings.start,
                len: slides.len(),
            });
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut order = build_order(slides.len(), settings.order, &mut rng);
        if let Some(position) = order.iter().position(|&index| index == settings.start) {
            order.swap(0, position);
        }

        Ok(Self {
            slides,
            mode: settings.order,
            interval: settings.interval,
            order,
            cursor: 0,
            paused: settings.paused,
            last_started: now,
            rng,
        })
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn current(&self) -> Option<SlideChange> {
        let index = *self.order.get(self.cursor)?;
        Some(SlideChange {
            index,
            slide: self.slides[index].clone(),
            started_at: self.last_started,
        })
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Pausing freezes advancement. Resuming grants the current slide a fresh
    /// full interval.
    pub fn set_paused(&mut self, paused: bool, now: Instant) {
        if self.paused && !paused {
            self.last_started = now;
        }
        self.paused = paused;
    }

    pub fn tick(&mut self, now: Instant) -> Option<SlideChange> {
        if self.paused || self.slides.len() <= 1 {
            return None;
        }
        if now.saturating_duration_since(self.last_started) < self.interval {
            return None;
        }
        self.advance(now);
        self.current()
    }

    pub fn skip(&mut self, now: Instant) -> Option<SlideChange> {
        if self.slides.len() <= 1 {
            return None;
        }
        self.advance(now);
        self.current()
    }

    /// Jumps to slide `index` (a position in [`Slideshow::slides`]).
    pub fn select(&mut self, index: usize, now: Instant) -> Result<SlideChange, SlideshowError> {
        let position = self
            .order
            .iter()
            .position(|&candidate| candidate == index)
            .ok_or(SlideshowError::OutOfRange {
                index,
                len: self.slides.len(),
            })?;
        self.cursor = position;
        self.last_started = now;
        self.current().ok_or(SlideshowError::Empty)
    }

    /// Drops the current slide and moves on. `None` once the board is empty.
    pub fn remove_current(&mut self, now: Instant) -> Option<SlideChange> {
        let removed = *self.order.get(self.cursor)?;
        self.slides.remove(removed);
        self.order.remove(self.cursor);
        for index in &mut self.order {
            if *index > removed {
                *index -= 1;
            }
        }
        if self.slides.is_empty() {
            self.order.clear();
            self.cursor = 0;
            return None;
        }
        if self.cursor >= self.order.len() {
            self.order = build_order(self.slides.len(), self.mode, &mut self.rng);
            self.cursor = 0;
        }
        self.last_started = now;
        self.current()
    }

    fn advance(&mut self, now: Instant) {
        self.cursor += 1;
        if self.cursor >= self.order.len() {
            self.order = build_order(self.slides.len(), self.mode, &mut self.rng);
            self.cursor = 0;
        }
        self.last_started = now;
    }
}

fn build_order(len: usize, mode: SlideOrder, rng: &mut StdRng) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    match mode {
        SlideOrder::Sequential => {}
        SlideOrder::Shuffle => {
            order.shuffle(rng);
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardconfig::BoardConfig;

    const BOARD: &str = r#"
version = 1

[slideshow]
interval = 1

[[items]]
kind = "image"
url = "one.jpg"

[[items]]
kind = "text"
text = "not shown"

[[items]]
kind = "video"
url = "two.mp4"

[[items]]
kind = "image"
url = "three.jpg"
"#;

    fn slideshow(seed: u64) -> (Slideshow, Instant) {
        let board = BoardConfig::from_toml_str(BOARD).unwrap();
        let now = Instant::now();
        let show = Slideshow::new(&board.items, &board.slideshow, seed, now).unwrap();
        (show, now)
    }

    fn urls(show: &Slideshow) -> Vec<&str> {
        show.slides().iter().map(|slide| slide.url.as_str()).collect()
    }

    #[test]
    fn keeps_only_visual_items() {
        let (show, _) = slideshow(1);
        assert_eq!(urls(&show), ["one.jpg", "two.mp4", "three.jpg"]);
        assert!(show.slides()[1].is_video);
        assert_eq!(show.current().unwrap().slide.url, "one.jpg");
    }

    #[test]
    fn advances_after_interval() {
        let (mut show, start) = slideshow(1);
        assert!(show.tick(start + Duration::from_millis(999)).is_none());
        let change = show.tick(start + Duration::from_secs(1)).unwrap();
        assert_eq!(change.slide.url, "two.mp4");
        let change = show.tick(start + Duration::from_secs(2)).unwrap();
        assert_eq!(change.slide.url, "three.jpg");
        let change = show.tick(start + Duration::from_secs(3)).unwrap();
        assert_eq!(change.slide.url, "one.jpg");
    }

    #[test]
    fn pause_freezes_and_resume_restarts_interval() {
        let (mut show, start) = slideshow(1);
        show.set_paused(true, start);
        assert!(show.tick(start + Duration::from_secs(10)).is_none());
        show.set_paused(false, start + Duration::from_secs(10));
        assert!(show.tick(start + Duration::from_millis(10_500)).is_none());
        assert!(show.tick(start + Duration::from_secs(11)).is_some());
    }

    #[test]
    fn skip_and_select() {
        let (mut show, start) = slideshow(1);
        assert_eq!(show.skip(start).unwrap().slide.url, "two.mp4");
        assert_eq!(show.select(2, start).unwrap().slide.url, "three.jpg");
        assert!(matches!(
            show.select(7, start),
            Err(SlideshowError::OutOfRange { index: 7, len: 3 })
        ));
    }

    #[test]
    fn removing_slides_until_empty() {
        let (mut show, start) = slideshow(1);
        show.skip(start);
        let next = show.remove_current(start).unwrap();
        assert_eq!(next.slide.url, "three.jpg");
        assert_eq!(urls(&show), ["one.jpg", "three.jpg"]);
        let next = show.remove_current(start).unwrap();
        assert_eq!(next.slide.url, "one.jpg");
        assert!(show.remove_current(start).is_none());
        assert!(show.is_empty());
        assert!(show.current().is_none());
    }

    #[test]
    fn shuffle_visits_every_slide_each_cycle() {
        let board = BoardConfig::from_toml_str(BOARD).unwrap();
        let settings = SlideshowSettings {
            order: SlideOrder::Shuffle,
            start: 1,
            ..board.slideshow.clone()
        };
        let start = Instant::now();
        let mut show = Slideshow::new(&board.items, &settings, 42, start).unwrap();
        let mut seen = vec![show.current().unwrap().index];
        assert_eq!(seen[0], 1);
        for _ in 0..2 {
            seen.push(show.skip(start).unwrap().index);
        }
        seen.sort_unstable();
        assert_eq!(seen, [0, 1, 2]);
    }

    #[test]
    fn rejects_boards_without_visuals() {
        let board = BoardConfig::from_toml_str(
            "version = 1\n[[items]]\nkind = \"text\"\ntext = \"hi\"\n",
        )
        .unwrap();
        let result = Slideshow::new(&board.items, &board.slideshow, 0, Instant::now());
        assert!(matches!(result, Err(SlideshowError::Empty)));
    }
}

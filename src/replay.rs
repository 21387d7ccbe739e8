//! 标注流回放器 (Annotation stream replay)
//!
//! 将按时间排序的稀疏标注记录与视频帧时间戳对齐. 调用方以非递减的
//! 查询时间驱动 `query(t)`, 每次得到:
//! - `(t, [])`: 下一组尚未到期 (或输入已耗尽)
//! - `(group_time, group)`: 同一原始时间戳的全部记录, 只交付一次
//!
//! 状态机:
//!
//! ```text
//! AwaitingFirstQuery ──query──▶ Buffering ──新时间戳/输入结束──▶ Ready
//!                                  ▲                              │
//!                                  └──────── t ≥ group_time ──────┘
//!                                                                 │ 无剩余记录
//!                                                                 ▼
//!                                                             Exhausted
//! ```
//!
//! 每次查询最多交付一组. 查询一次跳过多个组时, 积压的组在随后的查询中
//! 依次交付, 不丢弃也不合并.
//!
//! 前置条件: 查询时间非递减. 递减的查询不做校验, 行为未定义 (不会 panic,
//! 但交付时机不再有意义).

use std::iter::Peekable;
use std::mem;
use std::vec::IntoIter;

use tracing::trace;

use crate::annotation::{FaceRecord, LandmarkRecord};
use crate::detection::types::{Coord, Face, Landmarks, Point2};

/// 回放状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// 尚未收到查询, 未读取任何记录
    AwaitingFirstQuery,
    /// 正在收集同一时间戳的记录
    Buffering,
    /// 一组已完整, 等待查询时间追上
    Ready,
    /// 输入耗尽, 之后所有查询返回空
    Exhausted,
}

/// 一次查询的应答
#[derive(Debug, Clone, PartialEq)]
pub struct Reply<T> {
    /// 组的原始时间戳 (交付时) 或查询时间 (空应答)
    pub time: f64,
    pub items: Vec<T>,
}

impl<T> Reply<T> {
    fn empty(time: f64) -> Self {
        Self {
            time,
            items: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// 拉取式回放器
pub struct Replay<T> {
    source: Peekable<IntoIter<(f64, T)>>,
    pending: Vec<T>,
    pending_time: Option<f64>,
    state: State,
}

impl<T> Replay<T> {
    /// 从 `(time, item)` 序列创建; 序列须已按时间升序排列
    pub fn new<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (f64, T)>,
    {
        let records: Vec<(f64, T)> = records.into_iter().collect();
        Self {
            source: records.into_iter().peekable(),
            pending: Vec::new(),
            pending_time: None,
            state: State::AwaitingFirstQuery,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// 当前缓冲组的时间戳
    pub fn pending_time(&self) -> Option<f64> {
        self.pending_time
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == State::Exhausted
    }

    /// 丢弃时间早于 `t` 的记录 (不交付), 返回丢弃的记录数
    ///
    /// 用于从视频中途开始回放: 窗口之前的组永远不会被查询到.
    pub fn discard_before(&mut self, t: f64) -> usize {
        let mut dropped = 0;
        if self.pending_time.is_some_and(|time| time < t) {
            dropped += self.pending.len();
            self.pending.clear();
            self.pending_time = None;
            if self.state == State::Ready {
                self.state = State::Buffering;
            }
        }
        while self.source.next_if(|(time, _)| *time < t).is_some() {
            dropped += 1;
        }
        dropped
    }

    /// 以查询时间 `t` 推进状态机
    pub fn query(&mut self, t: f64) -> Reply<T> {
        loop {
            match self.state {
                State::AwaitingFirstQuery => self.state = State::Buffering,
                State::Buffering => self.fill(),
                State::Ready => {
                    // Ready 状态下 pending_time 必然存在
                    let group_time = match self.pending_time {
                        Some(time) => time,
                        None => {
                            self.state = State::Buffering;
                            continue;
                        }
                    };
                    if group_time > t {
                        return Reply::empty(t);
                    }

                    let items = mem::take(&mut self.pending);
                    self.pending_time = None;
                    self.state = if self.source.peek().is_some() {
                        State::Buffering
                    } else {
                        State::Exhausted
                    };
                    trace!(
                        "replay: group {:.3} ({} items) at query {:.3}",
                        group_time,
                        items.len(),
                        t
                    );
                    return Reply {
                        time: group_time,
                        items,
                    };
                }
                State::Exhausted => return Reply::empty(t),
            }
        }
    }

    /// 读取记录直到出现新的时间戳或输入结束
    fn fill(&mut self) {
        loop {
            let same_group = match (self.source.peek(), self.pending_time) {
                (None, _) => break,
                (Some(_), None) => true,
                (Some((time, _)), Some(current)) => *time == current,
            };
            if !same_group {
                break;
            }
            if let Some((time, item)) = self.source.next() {
                self.pending_time = Some(time);
                self.pending.push(item);
            }
        }

        self.state = if self.pending_time.is_some() {
            State::Ready
        } else {
            State::Exhausted
        };
    }
}

impl<C: Coord> Replay<Face<C>> {
    /// 人脸框回放; 坐标精度由 `C` 决定 (`i32` 截断取整, `f32` 亚像素)
    pub fn faces(records: Vec<FaceRecord>, frame_width: u32, frame_height: u32) -> Self {
        Self::new(records.into_iter().map(|record| {
            let face = Face {
                track: record.track,
                rect: record.payload.bbox.denormalize(frame_width, frame_height),
                status: record.payload.status,
            };
            (record.time, face)
        }))
    }
}

impl Replay<Landmarks> {
    /// 关键点回放; 每个点还原为最近的整数像素
    pub fn landmarks(records: Vec<LandmarkRecord>, frame_width: u32, frame_height: u32) -> Self {
        Self::new(records.into_iter().map(|record| {
            let points = record
                .payload
                .iter()
                .map(|&(x, y)| Point2::denormalize(x, y, frame_width, frame_height))
                .collect();
            (
                record.time,
                Landmarks {
                    track: record.track,
                    points,
                },
            )
        }))
    }
}

//! 事件系统模块
//!
//! 提供窗口事件、键盘事件以及一个同步的事件队列。
//!
//! 窗口层把原生事件翻译成这里的事件对象并压入 [`EventQueue`]，
//! 主循环每次迭代调用一次 [`EventQueue::drain`]，按注册顺序把事件分发给处理函数。
//!
//! # 事件处理链
//!
//! 同一类型可以注册多个处理函数。处理函数返回 `true` 表示事件已处理，
//! 后续处理函数不再收到该事件：
//!
//! ```
//! use tri_render::core::event::*;
//!
//! let mut queue: EventQueue<Vec<&'static str>> = EventQueue::new();
//! queue.subscribe(EventType::KeyDown, |_, log| { log.push("first"); false });
//! queue.subscribe(EventType::KeyDown, |_, log| { log.push("second"); true });
//! queue.subscribe(EventType::KeyDown, |_, log| { log.push("third"); true });
//!
//! queue.push(Box::new(KeyboardEvent::pressed(KeyCode::Escape)));
//! let mut log = Vec::new();
//! queue.drain(&mut log);
//! assert_eq!(log, ["first", "second"]);
//! ```

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;

/// 事件类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// 窗口调整大小事件
    WindowResize,

    /// 窗口关闭事件
    WindowClose,

    /// 键盘按下事件
    KeyDown,

    /// 键盘释放事件
    KeyUp,
}

impl EventType {
    /// 获取事件类型的名称，主要用于日志记录
    pub fn name(&self) -> &'static str {
        match self {
            EventType::WindowResize => "WindowResize",
            EventType::WindowClose => "WindowClose",
            EventType::KeyDown => "KeyDown",
            EventType::KeyUp => "KeyUp",
        }
    }
}

/// 键盘按键
///
/// 只列出渲染器关心的按键，其余按键使用 `Other` 变体，参数为平台相关的扫描码。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// Escape 键，请求关闭窗口
    Escape,

    /// 其他按键
    Other(u32),
}

/// 事件 trait
///
/// 所有事件都必须实现此 trait。`as_any` 让处理函数可以取回具体的事件类型：
///
/// ```
/// use tri_render::core::event::{Event, WindowResizeEvent};
///
/// let event: Box<dyn Event> = Box::new(WindowResizeEvent::new(1024, 768));
/// let resize = event.as_any().downcast_ref::<WindowResizeEvent>().unwrap();
/// assert_eq!(resize.width, 1024);
/// ```
pub trait Event: fmt::Debug {
    /// 获取事件类型
    fn event_type(&self) -> EventType;

    /// 获取事件详细信息（用于调试和日志）
    fn detail(&self) -> String {
        format!("{:?}", self)
    }

    /// 事件是否已被处理
    fn is_handled(&self) -> bool;

    /// 设置事件处理状态
    fn set_handled(&mut self, handled: bool);

    /// 用于向下转型到具体事件类型
    fn as_any(&self) -> &dyn Any;
}

/// 窗口调整大小事件
///
/// 尺寸为窗口客户区的物理像素。最小化时可能为 0x0。
#[derive(Debug, Clone)]
pub struct WindowResizeEvent {
    /// 新的窗口宽度（像素）
    pub width: u32,

    /// 新的窗口高度（像素）
    pub height: u32,

    handled: bool,
}

impl WindowResizeEvent {
    /// 创建新的窗口调整大小事件
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            handled: false,
        }
    }
}

impl Event for WindowResizeEvent {
    fn event_type(&self) -> EventType {
        EventType::WindowResize
    }

    fn detail(&self) -> String {
        format!("WindowResize: {}x{}", self.width, self.height)
    }

    fn is_handled(&self) -> bool {
        self.handled
    }

    fn set_handled(&mut self, handled: bool) {
        self.handled = handled;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// 窗口关闭事件
#[derive(Debug, Clone)]
pub struct WindowCloseEvent {
    handled: bool,
}

impl WindowCloseEvent {
    /// 创建新的窗口关闭事件
    pub fn new() -> Self {
        Self { handled: false }
    }
}

impl Default for WindowCloseEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl Event for WindowCloseEvent {
    fn event_type(&self) -> EventType {
        EventType::WindowClose
    }

    fn detail(&self) -> String {
        "WindowClose".to_string()
    }

    fn is_handled(&self) -> bool {
        self.handled
    }

    fn set_handled(&mut self, handled: bool) {
        self.handled = handled;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// 键盘事件
#[derive(Debug, Clone)]
pub struct KeyboardEvent {
    /// 按键
    pub key_code: KeyCode,

    /// 是否是按下事件
    pub pressed: bool,

    /// 是否为长按产生的重复事件
    pub repeat: bool,

    handled: bool,
}

impl KeyboardEvent {
    /// 创建按键按下事件
    pub fn pressed(key_code: KeyCode) -> Self {
        Self {
            key_code,
            pressed: true,
            repeat: false,
            handled: false,
        }
    }

    /// 创建按键释放事件
    pub fn released(key_code: KeyCode) -> Self {
        Self {
            key_code,
            pressed: false,
            repeat: false,
            handled: false,
        }
    }

    /// 标记为重复事件
    pub fn with_repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }
}

impl Event for KeyboardEvent {
    fn event_type(&self) -> EventType {
        if self.pressed {
            EventType::KeyDown
        } else {
            EventType::KeyUp
        }
    }

    fn detail(&self) -> String {
        format!(
            "Key{}: {:?}{}",
            if self.pressed { "Down" } else { "Up" },
            self.key_code,
            if self.repeat { " (repeat)" } else { "" }
        )
    }

    fn is_handled(&self) -> bool {
        self.handled
    }

    fn set_handled(&mut self, handled: bool) {
        self.handled = handled;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// 事件分发器
///
/// 包装一个事件的可变引用，只在事件类型匹配时调用处理函数。
pub struct EventDispatcher<'a> {
    event: &'a mut dyn Event,
}

impl<'a> EventDispatcher<'a> {
    /// 创建事件分发器
    pub fn new(event: &'a mut dyn Event) -> Self {
        Self { event }
    }

    /// 分发事件到处理函数
    ///
    /// 类型不匹配时不调用 `handler`，返回 `false`。
    pub fn dispatch<F>(&mut self, event_type: EventType, mut handler: F) -> bool
    where
        F: FnMut(&mut dyn Event) -> bool,
    {
        if self.event.event_type() == event_type {
            let handled = handler(self.event);
            self.event.set_handled(handled);
            handled
        } else {
            false
        }
    }

    /// 事件是否已被处理
    pub fn is_handled(&self) -> bool {
        self.event.is_handled()
    }
}

type Handler<C> = Box<dyn FnMut(&mut dyn Event, &mut C) -> bool>;

/// 同步事件队列
///
/// `C` 是处理函数可以修改的上下文（例如渲染器和关闭标志）。
/// 队列本身不持有上下文，分发时由调用方借出，因此处理函数不需要任何共享所有权。
pub struct EventQueue<C> {
    pending: VecDeque<Box<dyn Event>>,
    handlers: Vec<(EventType, Handler<C>)>,
}

impl<C> EventQueue<C> {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            handlers: Vec::new(),
        }
    }

    /// 压入一个待分发的事件
    pub fn push(&mut self, event: Box<dyn Event>) {
        self.pending.push_back(event);
    }

    /// 为某个事件类型注册处理函数，按注册顺序调用
    pub fn subscribe<F>(&mut self, event_type: EventType, handler: F)
    where
        F: FnMut(&mut dyn Event, &mut C) -> bool + 'static,
    {
        self.handlers.push((event_type, Box::new(handler)));
    }

    /// 待分发的事件数量
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// 分发所有待处理事件，返回被某个处理函数标记为已处理的事件数量
    pub fn drain(&mut self, ctx: &mut C) -> usize {
        let mut handled_count = 0;

        while let Some(mut event) = self.pending.pop_front() {
            let mut dispatcher = EventDispatcher::new(event.as_mut());

            for (event_type, handler) in self.handlers.iter_mut() {
                if dispatcher.dispatch(*event_type, |e| handler(e, &mut *ctx)) {
                    break;
                }
            }

            if dispatcher.is_handled() {
                handled_count += 1;
            } else {
                tracing::trace!(event = %event.detail(), "Event not handled");
            }
        }

        handled_count
    }
}

impl<C> Default for EventQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for EventQueue<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("pending", &self.pending)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

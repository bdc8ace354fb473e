use std::sync::Arc;
use std::time::Duration;

use iced::{
    alignment, clipboard,
    event::{self, Event as IcedEvent},
    keyboard::{self, Key},
    time,
    widget::{
        button, column, container, row, scrollable, scrollable::RelativeOffset, text, text_input,
        Column,
    },
    window, Element, Font, Length, Size, Subscription, Task, Theme,
};

use rag_desk::backend::{Backend, RagClient};
use rag_desk::chat::ChatReply;
use rag_desk::config::Config;
use rag_desk::diagnostics::{Channel, Level};
use rag_desk::error::UrlIngestError;
use rag_desk::exchange::Exchange;
use rag_desk::ingest::{FileHandle, UploadLimits, UploadReply};
use rag_desk::session::Session;
use rag_desk::view_sync::ScrollCommand;

const LOADING_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const LOADING_MESSAGES: [&str; 4] = [
    "Searching your documents...",
    "Reading the relevant pages...",
    "Drafting an answer...",
    "Checking the sources...",
];

pub fn run(config: Config) -> iced::Result {
    let settings = window::Settings {
        size: Size::new(config.window.width as f32, config.window.height as f32),
        min_size: Some(Size::new(
            config.window.min_width as f32,
            config.window.min_height as f32,
        )),
        position: window::Position::Centered,
        ..Default::default()
    };

    iced::application("RAG Chat Assistant", App::update, App::view)
        .theme(App::theme)
        .subscription(App::subscription)
        .window(settings)
        .default_font(Font::MONOSPACE)
        .run_with(move || App::new(config))
}

/// Answers are markdown; they are shown as-is.
fn render_markdown(markdown: &str) -> Element<'_, Message> {
    text(markdown).size(15).into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Chat,
    Upload,
    Url,
}

#[derive(Debug, Clone)]
pub enum Message {
    TabSelected(Tab),
    QueryChanged(String),
    Submit,
    QueryAnswered(ChatReply),
    ScrollToLatest,
    ChatShown,
    DismissError,
    PickFile,
    FilePicked(Result<Option<FileHandle>, String>),
    Uploaded(UploadReply),
    UrlChanged(String),
    LoadUrl,
    Tick,
    CopyLatest,
    Exit,
}

struct App {
    session: Session,
    backend: Arc<dyn Backend>,
    tab: Tab,
    loading_frame: usize,
    url_notice: Option<String>,
    conversation_id: scrollable::Id,
    input_id: text_input::Id,
}

impl App {
    fn new(config: Config) -> (Self, Task<Message>) {
        let backend: Arc<dyn Backend> = Arc::new(RagClient::new(config.backend.base_url.clone()));
        let input_id = text_input::Id::unique();

        let app = App {
            session: Session::new(&config),
            backend,
            tab: Tab::Chat,
            loading_frame: 0,
            url_notice: None,
            conversation_id: scrollable::Id::unique(),
            input_id: input_id.clone(),
        };

        (app, text_input::focus(input_id))
    }

    fn any_busy(&self) -> bool {
        self.session.chat().is_busy() || self.session.upload().is_busy()
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::TabSelected(tab) => {
                self.tab = tab;
                if tab == Tab::Chat {
                    Task::batch([
                        Task::done(Message::ChatShown),
                        text_input::focus(self.input_id.clone()),
                    ])
                } else {
                    Task::none()
                }
            }
            Message::QueryChanged(value) => {
                self.session.set_query_input(value);
                Task::none()
            }
            Message::Submit => match self.session.submit_input() {
                Ok(pending) => Task::perform(pending.run(self.backend.clone()), Message::QueryAnswered),
                Err(_) => Task::none(),
            },
            Message::QueryAnswered(reply) => {
                self.session.complete_query(reply);
                // Scroll in a later cycle so the new exchange is already laid out.
                Task::batch([
                    Task::done(Message::ScrollToLatest),
                    text_input::focus(self.input_id.clone()),
                ])
            }
            // Growth seen while another tab is open stays pending until the
            // conversation is shown again.
            Message::ScrollToLatest if self.tab != Tab::Chat => Task::none(),
            Message::ScrollToLatest => match self.session.sync_view() {
                Some(ScrollCommand::RevealLatest(_)) => {
                    scrollable::snap_to(self.conversation_id.clone(), RelativeOffset::END)
                }
                None => Task::none(),
            },
            Message::ChatShown => {
                self.session.sync_view();
                scrollable::snap_to(self.conversation_id.clone(), RelativeOffset::END)
            }
            Message::DismissError => {
                self.session.dismiss_error();
                Task::none()
            }
            Message::PickFile => {
                if self.session.upload().is_busy() {
                    return Task::none();
                }
                let limits = self.session.upload().limits().clone();
                Task::perform(pick_file(limits), Message::FilePicked)
            }
            Message::FilePicked(Ok(selected)) => match self.session.select_file(selected) {
                Ok(pending) => Task::perform(pending.run(self.backend.clone()), Message::Uploaded),
                Err(_) => Task::none(),
            },
            Message::FilePicked(Err(e)) => {
                self.session.report_pick_error(e);
                Task::none()
            }
            Message::Uploaded(reply) => {
                self.session.complete_upload(reply);
                Task::none()
            }
            Message::UrlChanged(value) => {
                self.session.set_url_input(value);
                self.url_notice = None;
                Task::none()
            }
            Message::LoadUrl => {
                let url = self.session.url().pending().to_string();
                self.url_notice = match self.session.register_url(&url) {
                    Err(e @ UrlIngestError::Unsupported(_)) => Some(e.to_string()),
                    Err(UrlIngestError::Empty) | Ok(()) => None,
                };
                Task::none()
            }
            Message::Tick => {
                if self.any_busy() {
                    self.loading_frame = (self.loading_frame + 1) % (LOADING_FRAMES.len() * 8);
                }
                Task::none()
            }
            Message::CopyLatest => match self.session.exchanges().latest() {
                Some(exchange) => clipboard::write(exchange.response.clone()),
                None => Task::none(),
            },
            Message::Exit => iced::exit(),
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        let timer = if self.any_busy() {
            time::every(Duration::from_millis(80)).map(|_| Message::Tick)
        } else {
            Subscription::none()
        };

        let events = event::listen_with(|event, _status, _id| {
            if let IcedEvent::Keyboard(keyboard::Event::KeyPressed {
                key: Key::Named(keyboard::key::Named::Escape),
                ..
            }) = event
            {
                Some(Message::Exit)
            } else {
                None
            }
        });

        Subscription::batch([timer, events])
    }

    fn view(&self) -> Element<Message> {
        let title = container(text("RAG Chat Assistant").size(32))
            .width(Length::Fill)
            .align_x(alignment::Horizontal::Center);

        let tabs = row![
            tab_button("Chat", Tab::Chat, self.tab),
            tab_button("Upload Document", Tab::Upload, self.tab),
            tab_button("URL", Tab::Url, self.tab),
        ]
        .spacing(6);

        let body = match self.tab {
            Tab::Chat => self.chat_view(),
            Tab::Upload => self.upload_view(),
            Tab::Url => self.url_view(),
        };

        container(column![title, tabs, body].spacing(16).padding(20))
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn chat_view(&self) -> Element<Message> {
        let exchanges = Column::with_children(self.session.exchanges().iter().map(exchange_view))
            .spacing(18)
            .padding(15)
            .width(Length::Fill);

        let conversation = scrollable(exchanges)
            .id(self.conversation_id.clone())
            .height(Length::Fill);

        let mut content = column![conversation].spacing(10);

        if self.session.chat().is_busy() {
            content = content.push(self.spinner());
        }

        if let Some(err) = self.session.last_error() {
            let banner = row![
                text(format!("Request failed: {}", err)).size(14).width(Length::Fill),
                button(text("Dismiss").size(14)).on_press(Message::DismissError),
            ]
            .spacing(10)
            .align_y(alignment::Vertical::Center);
            content = content.push(container(banner).padding(10).style(container::bordered_box));
        }

        let input = text_input("Ask a question...", self.session.chat().input())
            .on_input(Message::QueryChanged)
            .on_submit(Message::Submit)
            .padding(12)
            .size(16)
            .id(self.input_id.clone())
            .width(Length::Fill);

        let send_label = if self.session.chat().is_busy() {
            "Loading..."
        } else {
            "Send"
        };
        let send = button(text(send_label))
            .on_press_maybe(self.session.chat().can_submit().then_some(Message::Submit))
            .padding(12);

        let mut controls = row![input, send].spacing(8);
        if !self.session.exchanges().is_empty() && !self.session.chat().is_busy() {
            controls = controls.push(
                button(text("[Copy]").size(14))
                    .on_press(Message::CopyLatest)
                    .padding(12),
            );
        }

        content.push(controls).into()
    }

    fn upload_view(&self) -> Element<Message> {
        let upload = self.session.upload();

        let drop_area = button(
            column![
                text("Click to upload").size(18),
                text(upload.limits().hint()).size(12),
            ]
            .spacing(8)
            .align_x(alignment::Horizontal::Center),
        )
        .on_press_maybe((!upload.is_busy()).then_some(Message::PickFile))
        .padding(40)
        .width(Length::Fill)
        .style(button::secondary);

        let mut content = column![drop_area].spacing(12);

        if let Some(file) = upload.selected() {
            content = content
                .push(text(format!("Uploaded file: {}", file.name)).size(14))
                .push(text(format!("File size: {}", file.size_label())).size(14));
        }

        if upload.is_busy() {
            content = content.push(self.spinner());
        } else if let Some(last) = self.session.diagnostics().for_channel(Channel::Upload).last() {
            let prefix = match last.level {
                Level::Error => "Error",
                Level::Warn => "Warning",
                Level::Info => "Status",
            };
            content = content.push(text(format!("{}: {}", prefix, last.text)).size(13));
        }

        content.into()
    }

    fn url_view(&self) -> Element<Message> {
        let url = self.session.url();

        let input = text_input("Enter document URL...", url.pending())
            .on_input(Message::UrlChanged)
            .on_submit(Message::LoadUrl)
            .padding(12)
            .width(Length::Fill);
        let load = button(text("Load"))
            .on_press_maybe(url.can_register().then_some(Message::LoadUrl))
            .padding(12);

        let mut content = column![row![input, load].spacing(8)].spacing(12);

        if !url.pending().is_empty() {
            content = content.push(text(format!("Entered URL: {}", url.pending())).size(14));
        }
        if let Some(notice) = &self.url_notice {
            content = content.push(text(notice).size(13));
        }

        content.into()
    }

    fn spinner(&self) -> Element<Message> {
        let message_idx = (self.loading_frame / LOADING_FRAMES.len()) % LOADING_MESSAGES.len();
        let spinner_idx = self.loading_frame % LOADING_FRAMES.len();

        row![
            text(LOADING_FRAMES[spinner_idx]).size(20),
            text(LOADING_MESSAGES[message_idx]).size(14),
        ]
        .spacing(10)
        .align_y(alignment::Vertical::Center)
        .into()
    }

    fn theme(&self) -> Theme {
        Theme::TokyoNight
    }
}

fn tab_button(label: &str, tab: Tab, active: Tab) -> Element<'_, Message> {
    let style = if tab == active {
        button::primary
    } else {
        button::secondary
    };
    button(text(label).width(Length::Fill).align_x(alignment::Horizontal::Center))
        .on_press(Message::TabSelected(tab))
        .style(style)
        .width(Length::Fill)
        .into()
}

fn exchange_view(exchange: &Exchange) -> Element<'_, Message> {
    column![
        text(format!("> {}", exchange.query)).size(15),
        render_markdown(&exchange.response),
    ]
    .spacing(6)
    .into()
}

/// Native file dialog; a cancelled dialog is an empty selection.
async fn pick_file(limits: UploadLimits) -> Result<Option<FileHandle>, String> {
    let Some(picked) = rfd::AsyncFileDialog::new()
        .add_filter("Documents", &limits.allowed_extensions)
        .pick_file()
        .await
    else {
        return Ok(None);
    };

    FileHandle::read_checked(picked.path(), &limits)
        .await
        .map(Some)
        .map_err(|e| format!("{:#}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rag_desk::backend::UploadAck;
    use rag_desk::error::BackendError;

    struct Fixed;

    #[async_trait]
    impl Backend for Fixed {
        async fn ask(&self, query: &str) -> Result<String, BackendError> {
            Ok(format!("answer to {}", query))
        }

        async fn upload(&self, _file: FileHandle) -> Result<UploadAck, BackendError> {
            unreachable!("no uploads in these tests")
        }
    }

    /// Ask on the chat tab, switch to uploads, then let the answer land.
    async fn answered_on_upload_tab() -> App {
        let (mut app, _) = App::new(Config::default());
        app.backend = Arc::new(Fixed);

        app.session.set_query_input("What is RAG?");
        let pending = app.session.submit_input().unwrap();
        let reply = pending.run(app.backend.clone()).await;

        let _ = app.update(Message::TabSelected(Tab::Upload));
        let _ = app.update(Message::QueryAnswered(reply));
        let _ = app.update(Message::ScrollToLatest);
        app
    }

    #[tokio::test]
    async fn test_answer_on_hidden_chat_keeps_scroll_pending() {
        let mut app = answered_on_upload_tab().await;
        assert_eq!(app.session.exchanges().len(), 1);
        assert_eq!(app.session.sync_view(), Some(ScrollCommand::RevealLatest(0)));
    }

    #[tokio::test]
    async fn test_returning_to_chat_consumes_pending_scroll() {
        let mut app = answered_on_upload_tab().await;
        let _ = app.update(Message::TabSelected(Tab::Chat));
        let _ = app.update(Message::ChatShown);
        assert_eq!(app.session.sync_view(), None);
    }

    #[tokio::test]
    async fn test_answer_on_chat_tab_scrolls_once() {
        let (mut app, _) = App::new(Config::default());
        app.backend = Arc::new(Fixed);

        app.session.set_query_input("hello");
        let pending = app.session.submit_input().unwrap();
        let reply = pending.run(app.backend.clone()).await;
        let _ = app.update(Message::QueryAnswered(reply));
        let _ = app.update(Message::ScrollToLatest);

        assert_eq!(app.session.sync_view(), None);
    }
}

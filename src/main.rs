use std::ffi::OsString;
use std::path::PathBuf;

use gtk::glib::Uri;
use gtk::{gio::ApplicationFlags, glib, glib::clone, Application};
use gtk::{prelude::*, Button};
use kurbo::Size;

use pagecurl::config::ReaderConfig;
use pagecurl::window;

const APP_ID: &str = "com.andr2i.pagecurl";

fn main() -> glib::ExitCode {
    #[cfg(feature = "logging")]
    {
        env_logger::init();
        glib::log_set_default_handler(glib::rust_log_handler);
    }

    let app = Application::builder()
        .application_id(APP_ID)
        .flags(ApplicationFlags::HANDLES_OPEN | ApplicationFlags::HANDLES_COMMAND_LINE)
        .build();

    app.connect_command_line(|app, cmd| {
        build_ui(app, cmd.arguments());
        0
    });
    app.run_with_args(&std::env::args().collect::<Vec<_>>())
}

fn build_ui(app: &Application, args: Vec<OsString>) {
    let Some(fname) = args.get(1) else {
        open_file_dialog(app);
        return;
    };

    match from_str_to_uri(fname) {
        Ok(uri) => load(app, &uri),
        Err(err) => {
            window::show_error_dialog(
                app,
                &format!("Invalid file name: {:?}. Error: {}", fname, err),
            );
        }
    }
}

fn load(app: &Application, uri: &str) {
    if let Err(err) = window::open(app, uri, config_from_env()) {
        log::error!("failed to open {uri}: {err}");
        window::show_error_dialog(app, &format!("Error loading file: {}", err));
    }
}

/// Reader options, overridable through `PAGECURL_*` environment variables.
fn config_from_env() -> ReaderConfig {
    let mut config = ReaderConfig::default();
    let flag = |name: &str| std::env::var(name).ok().map(|v| v == "1" || v == "true");

    if let Some(remember) = flag("PAGECURL_REMEMBER_PAGE") {
        config.remember_last_page = remember;
    }
    if let Some(compact) = flag("PAGECURL_COMPACT") {
        config.compact = compact;
    }
    if let Some(size) = std::env::var("PAGECURL_SIZE")
        .ok()
        .and_then(|v| v.split_once('x').map(|(w, h)| (w.parse(), h.parse())))
        .and_then(|(w, h)| Some(Size::new(w.ok()?, h.ok()?)))
    {
        config.screen_size = size;
    }
    config
}

fn open_file_dialog(app: &Application) {
    let chooser = gtk::ApplicationWindow::builder()
        .application(app)
        .title("pagecurl")
        .build();
    let open_button = Button::from_icon_name("document-open");
    chooser.set_child(Some(&open_button));

    let dialog = gtk::FileDialog::builder()
        .title("Open PDF File")
        .modal(true)
        .build();

    open_button.connect_clicked(clone!(
        #[weak]
        app,
        #[weak]
        chooser,
        move |_| {
            dialog.open(
                Some(&chooser),
                gtk::gio::Cancellable::NONE,
                clone!(
                    #[weak]
                    app,
                    #[weak]
                    chooser,
                    move |file| match file {
                        Ok(file) => {
                            chooser.close();
                            load(&app, &file.uri());
                        }
                        Err(err) => {
                            window::show_error_dialog(
                                &app,
                                &format!("Error opening file: {}", err),
                            );
                        }
                    }
                ),
            );
        }
    ));

    chooser.present();
}

fn from_str_to_uri(oss: &OsString) -> Result<String, std::io::Error> {
    if let Ok(u) = Uri::parse(&oss.to_string_lossy(), glib::UriFlags::NONE) {
        return Ok(u.to_string());
    }

    let path = PathBuf::from(&oss).canonicalize()?;
    if path.is_file() {
        return Ok(format!("file://{}", path.to_string_lossy()));
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("File not found: {:?}", oss),
    ))
}

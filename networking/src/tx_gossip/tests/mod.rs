mod announcer;
mod lifecycle;
mod listener;

mod notifyservice;
mod sweeperservice;

pub use notifyservice::NotifyService;
pub use sweeperservice::SweeperService;

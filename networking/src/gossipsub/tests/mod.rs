mod topic;
